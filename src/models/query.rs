//! Query-related data models.
//!
//! This module defines the bodies of `/query` and the executor's result type.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default cap on rows returned for one question.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Maximum allowed row cap.
pub const MAX_ROW_LIMIT: u32 = 100_000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// A result row: column name to JSON value.
pub type JsonRow = serde_json::Map<String, JsonValue>;

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Natural-language question
    #[serde(default)]
    pub query: String,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// Rows produced by one executed statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<JsonRow>,
    pub row_count: usize,
    /// True if rows beyond the limit were dropped
    pub truncated: bool,
    pub execution_time_ms: u64,
}

/// Successful answer to a natural-language question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: Vec<JsonRow>,
    /// The statement the model produced and askdb executed
    pub sql: String,
    pub row_count: usize,
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResponse {
    pub fn new(sql: impl Into<String>, result: QueryResult) -> Self {
        Self {
            sql: sql.into(),
            row_count: result.row_count,
            truncated: result.truncated,
            execution_time_ms: result.execution_time_ms,
            response: result.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_missing_field_defaults_empty() {
        let req: QueryRequest = serde_json::from_str("{}").unwrap();
        assert!(req.query.is_empty());
    }

    #[test]
    fn test_query_response_shape() {
        let mut row = JsonRow::new();
        row.insert("id".to_string(), serde_json::json!(1));
        let result = QueryResult {
            rows: vec![row],
            row_count: 1,
            truncated: false,
            execution_time_ms: 3,
        };

        let json = serde_json::to_value(QueryResponse::new("SELECT id FROM t", result)).unwrap();
        assert_eq!(json["response"][0]["id"], 1);
        assert_eq!(json["sql"], "SELECT id FROM t");
        assert_eq!(json["row_count"], 1);
    }
}
