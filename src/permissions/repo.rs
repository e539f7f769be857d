use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{Permissions, ACTIVATED_PERMISSIONS};
use crate::db::{bounded, DataError};

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DataError>;

    /// Grants every known code in `codes`; unknown codes are skipped and
    /// existing grants are left alone.
    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), DataError>;

    async fn add_activated_permissions(&self, user_id: i64) -> Result<(), DataError> {
        self.add_for_user(user_id, ACTIVATED_PERMISSIONS).await
    }
}

#[derive(Clone)]
pub struct PgPermissionRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgPermissionRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DataError> {
        let codes = bounded(
            self.timeout,
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT permissions.code
                FROM permissions
                INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                WHERE users_permissions.user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.db),
        )
        .await?;
        Ok(codes.into_iter().collect())
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), DataError> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        bounded(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO users_permissions (user_id, permission_id)
                SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(codes)
            .execute(&self.db),
        )
        .await?;
        Ok(())
    }
}
