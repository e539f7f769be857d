use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::model::{hash_plaintext, Scope, Token};
use crate::{
    db::{bounded, DataError},
    users::{model::User, repo_types::UserRow},
};

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), DataError>;

    /// The owner of an unexpired token of `scope` whose plaintext is
    /// `plaintext`. Unknown, expired and wrong-scope tokens all yield
    /// `RecordNotFound`.
    async fn user_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, DataError>;

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DataError>;

    async fn new_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: Scope,
    ) -> Result<Token, DataError> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert(&token).await?;
        Ok(token)
    }
}

#[derive(Clone)]
pub struct PgTokenRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgTokenRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn insert(&self, token: &Token) -> Result<(), DataError> {
        bounded(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO tokens (hash, user_id, expiry, scope)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&token.hash)
            .bind(token.user_id)
            .bind(token.expiry)
            .bind(token.scope.as_str())
            .execute(&self.db),
        )
        .await?;
        Ok(())
    }

    async fn user_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, DataError> {
        let row = bounded(
            self.timeout,
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT users.id, users.created_at, users.username, users.email,
                       users.password_hash, users.activated, users.version
                FROM users
                INNER JOIN tokens ON users.id = tokens.user_id
                WHERE tokens.hash = $1
                AND tokens.scope = $2
                AND tokens.expiry > $3
                "#,
            )
            .bind(hash_plaintext(plaintext))
            .bind(scope.as_str())
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.db),
        )
        .await?;
        Ok(row.into())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DataError> {
        bounded(
            self.timeout,
            sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.db),
        )
        .await?;
        Ok(())
    }
}
