use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::model::{Quote, QuoteFilter, QuoteSort};
use crate::{
    db::{bounded, counted, DataError},
    filters::{Filters, Metadata},
};

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn insert(&self, quote: &mut Quote) -> Result<(), DataError>;
    async fn get(&self, id: i64) -> Result<Quote, DataError>;
    /// Overwrites `content`; no version guard, last write wins.
    async fn update(&self, quote: &Quote) -> Result<(), DataError>;
    async fn delete(&self, id: i64) -> Result<(), DataError>;
    async fn get_all(
        &self,
        filter: &QuoteFilter,
        filters: &Filters<QuoteSort>,
    ) -> Result<(Vec<Quote>, Metadata), DataError>;
}

#[derive(Clone)]
pub struct PgQuoteRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgQuoteRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl QuoteRepository for PgQuoteRepository {
    async fn insert(&self, quote: &mut Quote) -> Result<(), DataError> {
        let (id, created_at) = bounded(
            self.timeout,
            sqlx::query_as::<_, (i64, OffsetDateTime)>(
                r#"
                INSERT INTO quotes (user_id, content)
                VALUES ($1, $2)
                RETURNING quote_id, created_at
                "#,
            )
            .bind(quote.user_id)
            .bind(&quote.content)
            .fetch_one(&self.db),
        )
        .await?;
        quote.id = id;
        quote.created_at = created_at;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Quote, DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        bounded(
            self.timeout,
            sqlx::query_as::<_, Quote>(
                r#"
                SELECT q.quote_id AS id, u.username, q.user_id, q.content, q.created_at
                FROM quotes q
                JOIN users u ON q.user_id = u.id
                WHERE q.quote_id = $1
                "#,
            )
            .bind(id)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn update(&self, quote: &Quote) -> Result<(), DataError> {
        bounded(
            self.timeout,
            sqlx::query_scalar::<_, i64>(
                "UPDATE quotes SET content = $1 WHERE quote_id = $2 RETURNING quote_id",
            )
            .bind(&quote.content)
            .bind(quote.id)
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
            sqlx::query("DELETE FROM quotes WHERE quote_id = $1")
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
        filter: &QuoteFilter,
        filters: &Filters<QuoteSort>,
    ) -> Result<(Vec<Quote>, Metadata), DataError> {
        let sql = format!(
            r#"
            SELECT COUNT(*) OVER() AS total_records,
                   q.quote_id AS id, u.username, q.user_id, q.content, q.created_at
            FROM quotes q
            JOIN users u ON q.user_id = u.id
            WHERE (to_tsvector('simple', q.content) @@ plainto_tsquery('simple', $1) OR $1 = '')
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            filters.order_by()
        );
        let (quotes, total_records) = bounded(self.timeout, async {
            let rows = sqlx::query(&sql)
                .bind(&filter.content)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.db)
                .await?;
            counted::<Quote>(rows)
        })
        .await?;

        Ok((
            quotes,
            Metadata::calculate(total_records, filters.page, filters.page_size),
        ))
    }
}
