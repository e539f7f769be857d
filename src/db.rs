use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    FromRow, PgPool, Row,
};

use crate::config::AppConfig;

/// Errors raised by repository implementations.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("record not found")]
    RecordNotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("database call timed out")]
    Timeout,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::RecordNotFound,
            other => DataError::Database(other),
        }
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_timeout)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// Runs one database call under `limit`; expiry cancels the call.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, DataError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(DataError::from),
        Err(_) => Err(DataError::Timeout),
    }
}

/// Splits rows carrying a `COUNT(*) OVER() AS total_records` column into
/// the decoded records and the total of the filtered set.
pub fn counted<T>(rows: Vec<PgRow>) -> Result<(Vec<T>, i64), sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    let mut total_records = 0;
    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        total_records = row.try_get("total_records")?;
        records.push(T::from_row(row)?);
    }
    Ok((records, total_records))
}

/// True when `err` is a unique violation of `constraint`.
pub fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation() && db.constraint() == Some(constraint))
        .unwrap_or(false)
}
