use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{filters::SortKey, validator::Validator};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Quote {
    pub id: i64,
    /// Author's username, joined in on read.
    pub username: String,
    pub user_id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Quote {
    pub fn new(user_id: i64, username: String, content: String) -> Self {
        Self {
            id: 0,
            username,
            user_id,
            content,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

pub fn validate_quote(v: &mut Validator, quote: &Quote) {
    v.check(!quote.content.is_empty(), "content", "must be provided");
    v.check(
        quote.content.len() <= 500,
        "content",
        "must not be more than 500 bytes long",
    );
    v.check(quote.user_id > 0, "user_id", "must be a valid user ID");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSort {
    Id,
    UserId,
    Content,
}

impl SortKey for QuoteSort {
    const SAFELIST: &'static [&'static str] =
        &["id", "user_id", "content", "-id", "-user_id", "-content"];
    const DEFAULT_SORT: &'static str = "id";
    const DEFAULT_PAGE_SIZE: i64 = 15;
    const PRIMARY: Self = Self::Id;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "user_id" => Some(Self::UserId),
            "content" => Some(Self::Content),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Id => "q.quote_id",
            Self::UserId => "q.user_id",
            Self::Content => "q.content",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuoteFilter {
    pub content: String,
}
