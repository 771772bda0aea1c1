//! Query execution engine.
//!
//! Runs one generated statement against the active pool with:
//! - Row limits (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//!
//! # Architecture
//!
//! The executor uses database-specific submodules (`mysql`, `postgres`,
//! `sqlite`) that share one shape and differ only in their row type.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{AppError, AppResult};
use crate::models::{
    DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, JsonRow, MAX_ROW_LIMIT, QueryResult,
};
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    query_timeout: Duration,
    row_limit: u32,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }

    /// Create a new query executor with custom settings.
    ///
    /// The row limit is clamped to `[1, MAX_ROW_LIMIT]`.
    pub fn with_limits(timeout_secs: u64, row_limit: u32) -> Self {
        Self {
            query_timeout: Duration::from_secs(timeout_secs),
            row_limit: row_limit.clamp(1, MAX_ROW_LIMIT),
        }
    }

    pub fn row_limit(&self) -> u32 {
        self.row_limit
    }

    /// Execute `sql` and return at most `row_limit` rows.
    pub async fn execute(&self, pool: &DbPool, sql: &str) -> AppResult<QueryResult> {
        let start = Instant::now();

        debug!(
            sql = %sql,
            limit = self.row_limit,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        let fetch_limit = self.row_limit as usize + 1;
        let rows = match pool {
            DbPool::MySql(p) => {
                let rows = mysql::fetch_rows(p, sql, fetch_limit, self.query_timeout).await?;
                to_json_rows(rows)
            }
            DbPool::Postgres(p) => {
                let rows = postgres::fetch_rows(p, sql, fetch_limit, self.query_timeout).await?;
                to_json_rows(rows)
            }
            DbPool::Sqlite(p) => {
                let rows = sqlite::fetch_rows(p, sql, fetch_limit, self.query_timeout).await?;
                to_json_rows(rows)
            }
        };

        Ok(self.finish(rows, start))
    }

    /// Apply the row cap to fetched rows.
    fn finish(&self, mut rows: Vec<JsonRow>, start: Instant) -> QueryResult {
        let total_rows = rows.len();
        let truncated = total_rows > self.row_limit as usize;
        if truncated {
            rows.truncate(self.row_limit as usize);
            warn!(limit = self.row_limit, "Query result truncated");
        }

        let execution_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            rows = rows.len(),
            execution_time_ms = execution_time_ms,
            "Query finished"
        );

        QueryResult {
            row_count: rows.len(),
            rows,
            truncated,
            execution_time_ms,
        }
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn to_json_rows<R: RowToJson>(rows: Vec<R>) -> Vec<JsonRow> {
    rows.iter().map(RowToJson::to_json_map).collect()
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> AppResult<Vec<R>> {
    results
        .into_iter()
        .map(|r| r.map_err(AppError::from))
        .collect()
}

fn timeout_error(timeout: Duration) -> AppError {
    AppError::timeout("query execution", timeout.as_secs())
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Statements are sent without bind parameters, which also keeps values in
// the server's text encoding for the decoders in `types`.

mod mysql {
    use super::*;
    use sqlx::Executor;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> AppResult<Vec<MySqlRow>> {
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();
        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error(query_timeout)),
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::Executor;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> AppResult<Vec<PgRow>> {
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();
        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error(query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::Executor;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> AppResult<Vec<SqliteRow>> {
        let rows_future = pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>();
        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error(query_timeout)),
        }
    }
}
