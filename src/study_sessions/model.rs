use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{filters::SortKey, validator::Validator};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudySession {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub fn validate_study_session(v: &mut Validator, s: &StudySession) {
    v.check(!s.title.is_empty(), "title", "must be provided");
    v.check(
        s.title.len() <= 100,
        "title",
        "must not be more than 100 bytes long",
    );
    v.check(s.user_id > 0, "user_id", "must be a valid user ID");
    v.check(
        s.end_time > s.start_time,
        "end_time",
        "must be after the start time",
    );
    v.check(
        s.description.len() <= 500,
        "description",
        "must not be more than 500 bytes long",
    );
    v.check(
        s.subject.len() <= 100,
        "subject",
        "must not be more than 100 bytes long",
    );
}

/// Ascending only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudySessionSort {
    SessionId,
    Title,
    Subject,
    IsCompleted,
    CreatedAt,
}

impl SortKey for StudySessionSort {
    const SAFELIST: &'static [&'static str] =
        &["session_id", "title", "subject", "is_completed", "created_at"];
    const DEFAULT_SORT: &'static str = "created_at";
    const DEFAULT_PAGE_SIZE: i64 = 20;
    const PRIMARY: Self = Self::SessionId;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "session_id" => Some(Self::SessionId),
            "title" => Some(Self::Title),
            "subject" => Some(Self::Subject),
            "is_completed" => Some(Self::IsCompleted),
            "created_at" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::SessionId => "session_id",
            Self::Title => "title",
            Self::Subject => "subject",
            Self::IsCompleted => "is_completed",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudySessionFilter {
    pub title: String,
    pub subject: String,
    pub is_completed: Option<bool>,
}
