//! Error types for askdb.
//!
//! All fallible paths return [`AppError`]. Every variant maps to a non-2xx
//! HTTP status and a structured JSON body, so no request ends without a
//! response body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Schema reflection failed: {message} (object: {object})")]
    SchemaReflection { message: String, object: String },

    #[error("SQL generation failed: {message}")]
    Translation { message: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Database connection not established. Call /connect first")]
    NotConnected,

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema reflection error for the given table or catalog object.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::SchemaReflection {
            message: message.into(),
            object: object.into(),
        }
    }

    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::SchemaReflection { .. } => "schema_reflection",
            Self::Translation { .. } => "translation",
            Self::Execution { .. } => "execution",
            Self::Permission { .. } => "permission",
            Self::Validation { .. } => "validation",
            Self::NotConnected => "not_connected",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
            Self::Internal { .. } => "internal",
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::NotConnected => Some("POST a connection config to /connect"),
            Self::Permission { .. } => {
                Some("Rephrase the question as a read-only request, or start the server with --allow-writes")
            }
            Self::Timeout { .. } => Some("Narrow the question or raise --query-timeout"),
            _ => None,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::NotConnected => StatusCode::BAD_REQUEST,
            Self::Permission { .. } => StatusCode::FORBIDDEN,
            Self::Execution { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Translation { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Connection { .. }
            | Self::SchemaReflection { .. }
            | Self::Io(_)
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert sqlx errors to AppError.
///
/// Errors raised while a statement runs are treated as execution failures;
/// connection-level failures keep their own kind.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => AppError::connection(
                msg.to_string(),
                "Check the connection parameters and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                AppError::execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => AppError::execution("No rows returned", None),
            // the configured acquire timeout is not known here
            sqlx::Error::PoolTimedOut => AppError::connection(
                "Timed out waiting for a pooled connection",
                "Raise --connect-timeout or --max-connections, or check that the database is reachable",
            ),
            sqlx::Error::PoolClosed => {
                AppError::connection("Connection pool is closed", "Reconnect via /connect")
            }
            sqlx::Error::Io(io_err) => AppError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => AppError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => AppError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                AppError::execution(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                AppError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => AppError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => AppError::internal("Database worker crashed"),
            _ => AppError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::translation(err.to_string())
    }
}

/// Result type alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        let sql_state = match err {
            AppError::Execution { sql_state, .. } => sql_state.clone(),
            _ => None,
        };
        Self {
            error: err.to_string(),
            kind: err.kind(),
            suggestion: err.suggestion().map(String::from),
            sql_state,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = AppError::connection("refused", "Check that the server is running");
        assert_eq!(err.suggestion(), Some("Check that the server is running"));
        assert_eq!(AppError::validation("bad").suggestion(), None);
    }

    #[test]
    fn test_not_connected_is_client_error() {
        assert_eq!(AppError::NotConnected.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotConnected.kind(), "not_connected");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::permission("DROP", "read-only").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::execution("no such table", None).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::translation("quota").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::timeout("query", 30).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::connection("refused", "retry").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_includes_sql_state() {
        let err = AppError::execution("syntax error", Some("42601".to_string()));
        let body = ErrorBody::from(&err);
        assert_eq!(body.kind, "execution");
        assert_eq!(body.sql_state.as_deref(), Some("42601"));

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("syntax error"));
        assert!(json.get("suggestion").is_none());
    }

    #[test]
    fn test_pool_timeout_has_no_fixed_duration() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), "connection");
        assert!(!err.to_string().contains("30s"));
        assert!(err.suggestion().unwrap().contains("--connect-timeout"));
    }

    #[test]
    fn test_error_body_includes_suggestion() {
        let body = ErrorBody::from(&AppError::connection("failed", "try reconnecting"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["suggestion"], "try reconnecting");
        assert!(json.get("sql_state").is_none());
    }
}
