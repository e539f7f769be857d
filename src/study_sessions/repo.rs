use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::model::{StudySession, StudySessionFilter, StudySessionSort};
use crate::{
    db::{bounded, counted, DataError},
    filters::{Filters, Metadata},
};

#[async_trait]
pub trait StudySessionRepository: Send + Sync {
    async fn insert(&self, session: &mut StudySession) -> Result<(), DataError>;
    async fn get(&self, id: i64) -> Result<StudySession, DataError>;
    async fn update(&self, session: &StudySession) -> Result<(), DataError>;
    async fn delete(&self, id: i64) -> Result<(), DataError>;
    async fn get_all(
        &self,
        filter: &StudySessionFilter,
        filters: &Filters<StudySessionSort>,
    ) -> Result<(Vec<StudySession>, Metadata), DataError>;
}

const SESSION_COLUMNS: &str = "session_id AS id, user_id, title, description, subject, \
                               start_time, end_time, is_completed, created_at";

#[derive(Clone)]
pub struct PgStudySessionRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgStudySessionRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl StudySessionRepository for PgStudySessionRepository {
    async fn insert(&self, session: &mut StudySession) -> Result<(), DataError> {
        let (id, created_at) = bounded(
            self.timeout,
            sqlx::query_as::<_, (i64, OffsetDateTime)>(
                r#"
                INSERT INTO study_sessions
                    (user_id, title, description, subject, start_time, end_time, is_completed)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING session_id, created_at
                "#,
            )
            .bind(session.user_id)
            .bind(&session.title)
            .bind(&session.description)
            .bind(&session.subject)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.is_completed)
            .fetch_one(&self.db),
        )
        .await?;
        session.id = id;
        session.created_at = created_at;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<StudySession, DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        let sql = format!("SELECT {SESSION_COLUMNS} FROM study_sessions WHERE session_id = $1");
        bounded(
            self.timeout,
            sqlx::query_as::<_, StudySession>(&sql)
                .bind(id)
                .fetch_one(&self.db),
        )
        .await
    }

    async fn update(&self, session: &StudySession) -> Result<(), DataError> {
        bounded(
            self.timeout,
            sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE study_sessions
                SET title = $1, description = $2, subject = $3,
                    start_time = $4, end_time = $5, is_completed = $6
                WHERE session_id = $7
                RETURNING session_id
                "#,
            )
            .bind(&session.title)
            .bind(&session.description)
            .bind(&session.subject)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.is_completed)
            .bind(session.id)
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
            sqlx::query("DELETE FROM study_sessions WHERE session_id = $1")
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
        filter: &StudySessionFilter,
        filters: &Filters<StudySessionSort>,
    ) -> Result<(Vec<StudySession>, Metadata), DataError> {
        let sql = format!(
            r#"
            SELECT COUNT(*) OVER() AS total_records, {SESSION_COLUMNS}
            FROM study_sessions
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
            AND (to_tsvector('simple', subject) @@ plainto_tsquery('simple', $2) OR $2 = '')
            AND ($3::boolean IS NULL OR is_completed = $3)
            ORDER BY {}
            LIMIT $4 OFFSET $5
            "#,
            filters.order_by()
        );
        let (sessions, total_records) = bounded(self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(&filter.title)
                .bind(&filter.subject)
                .bind(filter.is_completed)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db)
                .await?;
            counted::<StudySession>(rows)
        })
        .await?;

        Ok((
            sessions,
            Metadata::calculate(total_records, filters.page, filters.page_size),
        ))
    }
}
