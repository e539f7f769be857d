use sqlx::FromRow;
use time::OffsetDateTime;

use super::{model::User, password::Password};

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            email: r.email,
            password: Password::from_hash(r.password_hash),
            activated: r.activated,
            version: r.version,
            created_at: r.created_at,
        }
    }
}
