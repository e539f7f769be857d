use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::{
    model::{User, UserFilter, UserSort},
    password::Password,
    repo_types::UserRow,
};
use crate::{
    db::{bounded, counted, violates, DataError},
    filters::{Filters, Metadata},
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persists a new user, filling in `id`, `created_at` and `version`.
    async fn insert(&self, user: &mut User) -> Result<(), DataError>;

    async fn get(&self, id: i64) -> Result<User, DataError>;

    async fn get_by_email(&self, email: &str) -> Result<User, DataError>;

    /// Overwrites the mutable fields, guarded by `user.version`. A stale
    /// version yields `EditConflict`; on success `user.version` is bumped.
    async fn update(&self, user: &mut User) -> Result<(), DataError>;

    /// Marks the user activated, guarded by `user.version`.
    async fn activate(&self, user: &mut User) -> Result<(), DataError>;

    async fn update_password(&self, id: i64, password: &Password) -> Result<(), DataError>;

    async fn delete(&self, id: i64) -> Result<(), DataError>;

    async fn get_all(
        &self,
        filter: &UserFilter,
        filters: &Filters<UserSort>,
    ) -> Result<(Vec<User>, Metadata), DataError>;
}

const USER_COLUMNS: &str = "id, created_at, username, email, password_hash, activated, version";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

fn duplicate_email(err: DataError) -> DataError {
    match err {
        DataError::Database(ref e) if violates(e, "users_email_key") => DataError::DuplicateEmail,
        other => other,
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &mut User) -> Result<(), DataError> {
        let (id, created_at, version) = bounded(
            self.timeout,
            sqlx::query_as::<_, (i64, OffsetDateTime, i32)>(
                r#"
                INSERT INTO users (username, email, password_hash, activated)
                VALUES ($1, $2, $3, $4)
                RETURNING id, created_at, version
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.password.hash())
            .bind(user.activated)
            .fetch_one(&self.db),
        )
        .await
        .map_err(duplicate_email)?;

        user.id = id;
        user.created_at = created_at;
        user.version = version;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<User, DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = bounded(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql).bind(id).fetch_one(&self.db),
        )
        .await?;
        Ok(row.into())
    }

    async fn get_by_email(&self, email: &str) -> Result<User, DataError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = bounded(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(email)
                .fetch_one(&self.db),
        )
        .await?;
        Ok(row.into())
    }

    async fn update(&self, user: &mut User) -> Result<(), DataError> {
        let version = bounded(
            self.timeout,
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET username = $1, email = $2, password_hash = $3,
                    activated = $4, version = version + 1
                WHERE id = $5 AND version = $6
                RETURNING version
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.password.hash())
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.db),
        )
        .await
        .map_err(duplicate_email)?;

        user.version = version.ok_or(DataError::EditConflict)?;
        Ok(())
    }

    async fn activate(&self, user: &mut User) -> Result<(), DataError> {
        let version = bounded(
            self.timeout,
            sqlx::query_scalar::<_, i32>(
                r#"
                UPDATE users
                SET activated = true, version = version + 1
                WHERE id = $1 AND version = $2
                RETURNING version
                "#,
            )
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.db),
        )
        .await?;

        user.version = version.ok_or(DataError::EditConflict)?;
        user.activated = true;
        Ok(())
    }

    async fn update_password(&self, id: i64, password: &Password) -> Result<(), DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        bounded(
            self.timeout,
            sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE users
                SET password_hash = $1, version = version + 1
                WHERE id = $2
                RETURNING id
                "#,
            )
            .bind(password.hash())
            .bind(id)
            .fetch_one(&self.db),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        let result = bounded(
            self.timeout,
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(&self.db),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::RecordNotFound);
        }
        Ok(())
    }

    async fn get_all(
        &self,
        filter: &UserFilter,
        filters: &Filters<UserSort>,
    ) -> Result<(Vec<User>, Metadata), DataError> {
        let sql = format!(
            r#"
            SELECT COUNT(*) OVER() AS total_records, {USER_COLUMNS}
            FROM users
            WHERE (to_tsvector('simple', username) @@ plainto_tsquery('simple', $1) OR $1 = '')
            AND ($2 = '' OR email = $2)
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            filters.order_by()
        );
        let (rows, total_records) = bounded(self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(&filter.username)
                .bind(&filter.email)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db)
                .await?;
            counted::<UserRow>(rows)
        })
        .await?;

        let users = rows.into_iter().map(User::from).collect();
        Ok((
            users,
            Metadata::calculate(total_records, filters.page, filters.page_size),
        ))
    }
}
