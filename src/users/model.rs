use serde::Serialize;
use time::OffsetDateTime;

use super::password::Password;
use crate::{
    filters::SortKey,
    validator::{matches, Validator, EMAIL_RX},
};

pub const PASSWORD_MIN_BYTES: usize = 8;
pub const PASSWORD_MAX_BYTES: usize = 72;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// An unsaved, unactivated user. `id`, `version` and `created_at` are
    /// assigned on insert.
    pub fn new(username: String, email: String, password: Password) -> Self {
        Self {
            id: 0,
            username,
            email,
            password,
            activated: false,
            version: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, key: &str, password: &str) {
    v.check(!password.is_empty(), key, "must be provided");
    v.check(
        password.len() >= PASSWORD_MIN_BYTES,
        key,
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= PASSWORD_MAX_BYTES,
        key,
        "must not be more than 72 bytes long",
    );
}

pub fn validate_user(v: &mut Validator, user: &User) {
    v.check(!user.username.is_empty(), "username", "must be provided");
    v.check(
        user.username.len() <= 200,
        "username",
        "must not be more than 200 bytes long",
    );

    validate_email(v, &user.email);

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, "password", plaintext);
    }

    assert!(
        !user.password.hash().is_empty(),
        "missing password hash for user {}",
        user.id
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSort {
    Id,
    Username,
    Email,
}

impl SortKey for UserSort {
    const SAFELIST: &'static [&'static str] = &["id", "username", "email", "-id", "-username", "-email"];
    const DEFAULT_SORT: &'static str = "id";
    const DEFAULT_PAGE_SIZE: i64 = 15;
    const PRIMARY: Self = Self::Id;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "username" => Some(Self::Username),
            "email" => Some(Self::Email),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Email => "email",
        }
    }
}

/// List filters for accounts; empty values match everything.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub username: String,
    pub email: String,
}
