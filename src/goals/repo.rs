use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::model::{Goal, GoalFilter, GoalSort};
use crate::{
    db::{bounded, counted, DataError},
    filters::{Filters, Metadata},
};

#[async_trait]
pub trait GoalRepository: Send + Sync {
    async fn insert(&self, goal: &mut Goal) -> Result<(), DataError>;
    async fn get(&self, id: i64) -> Result<Goal, DataError>;
    /// Full overwrite of the mutable fields; last write wins.
    async fn update(&self, goal: &Goal) -> Result<(), DataError>;
    async fn delete(&self, id: i64) -> Result<(), DataError>;
    async fn get_all(
        &self,
        filter: &GoalFilter,
        filters: &Filters<GoalSort>,
    ) -> Result<(Vec<Goal>, Metadata), DataError>;
}

const GOAL_COLUMNS: &str = "goal_id AS id, user_id, goal_text, target_date, is_completed, created_at";

#[derive(Clone)]
pub struct PgGoalRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgGoalRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl GoalRepository for PgGoalRepository {
    async fn insert(&self, goal: &mut Goal) -> Result<(), DataError> {
        let (id, created_at) = bounded(
            self.timeout,
            sqlx::query_as::<_, (i64, OffsetDateTime)>(
                r#"
                INSERT INTO goals (user_id, goal_text, target_date, is_completed)
                VALUES ($1, $2, $3, $4)
                RETURNING goal_id, created_at
                "#,
            )
            .bind(goal.user_id)
            .bind(&goal.goal_text)
            .bind(goal.target_date)
            .bind(goal.is_completed)
            .fetch_one(&self.db),
        )
        .await?;
        goal.id = id;
        goal.created_at = created_at;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Goal, DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        let sql = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE goal_id = $1");
        bounded(
            self.timeout,
            sqlx::query_as::<_, Goal>(&sql).bind(id).fetch_one(&self.db),
        )
        .await
    }

    async fn update(&self, goal: &Goal) -> Result<(), DataError> {
        bounded(
            self.timeout,
            sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE goals
                SET goal_text = $1, target_date = $2, is_completed = $3
                WHERE goal_id = $4
                RETURNING goal_id
                "#,
            )
            .bind(&goal.goal_text)
            .bind(goal.target_date)
            .bind(goal.is_completed)
            .bind(goal.id)
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
            sqlx::query("DELETE FROM goals WHERE goal_id = $1")
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
        filter: &GoalFilter,
        filters: &Filters<GoalSort>,
    ) -> Result<(Vec<Goal>, Metadata), DataError> {
        let sql = format!(
            r#"
            SELECT COUNT(*) OVER() AS total_records, {GOAL_COLUMNS}
            FROM goals
            WHERE (to_tsvector('simple', goal_text) @@ plainto_tsquery('simple', $1) OR $1 = '')
            AND ($2::boolean IS NULL OR is_completed = $2)
            AND ($3::date IS NULL OR (target_date AT TIME ZONE 'UTC')::date = $3)
            ORDER BY {}
            LIMIT $4 OFFSET $5
            "#,
            filters.order_by()
        );
        let (goals, total_records) = bounded(self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(&filter.goal_text)
                .bind(filter.is_completed)
                .bind(filter.target_date)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db)
                .await?;
            counted::<Goal>(rows)
        })
        .await?;

        Ok((
            goals,
            Metadata::calculate(total_records, filters.page, filters.page_size),
        ))
    }
}
