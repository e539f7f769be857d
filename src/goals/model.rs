use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{filters::SortKey, validator::Validator};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub goal_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub target_date: OffsetDateTime,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Goal {
    /// `target_date` is stored in UTC, as Postgres hands it back.
    pub fn new(
        user_id: i64,
        goal_text: String,
        target_date: OffsetDateTime,
        is_completed: bool,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            goal_text,
            target_date: target_date.to_offset(UtcOffset::UTC),
            is_completed,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

pub fn validate_goal(v: &mut Validator, goal: &Goal) {
    v.check(!goal.goal_text.is_empty(), "goal_text", "must be provided");
    v.check(
        goal.goal_text.len() <= 255,
        "goal_text",
        "must not be more than 255 bytes long",
    );
    v.check(goal.user_id > 0, "user_id", "must be a valid user ID");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalSort {
    GoalId,
    UserId,
    GoalText,
    TargetDate,
    IsCompleted,
}

impl SortKey for GoalSort {
    const SAFELIST: &'static [&'static str] = &[
        "goal_id",
        "user_id",
        "goal_text",
        "target_date",
        "is_completed",
        "-goal_id",
        "-user_id",
        "-goal_text",
        "-target_date",
        "-is_completed",
    ];
    const DEFAULT_SORT: &'static str = "goal_id";
    const DEFAULT_PAGE_SIZE: i64 = 15;
    const PRIMARY: Self = Self::GoalId;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "goal_id" => Some(Self::GoalId),
            "user_id" => Some(Self::UserId),
            "goal_text" => Some(Self::GoalText),
            "target_date" => Some(Self::TargetDate),
            "is_completed" => Some(Self::IsCompleted),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::GoalId => "goal_id",
            Self::UserId => "user_id",
            Self::GoalText => "goal_text",
            Self::TargetDate => "target_date",
            Self::IsCompleted => "is_completed",
        }
    }
}

/// `goal_text` is full-text; `None` skips the other predicates.
#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
    pub goal_text: String,
    pub is_completed: Option<bool>,
    pub target_date: Option<Date>,
}
