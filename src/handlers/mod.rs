//! HTTP request handlers.
//!
//! Every handler returns `Result<Json<_>, AppError>`, so failures always
//! carry a status code and an [`ErrorBody`](crate::error::ErrorBody).

mod connection;
mod query;
mod schema;

pub use connection::{ConnectResponse, HealthResponse, MessageResponse, connect, disconnect, health};
pub use query::query;
pub use schema::{SchemaContextResponse, schema, schema_context};

use crate::error::AppError;
use crate::service::QueryService;
use axum::extract::rejection::JsonRejection;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: QueryService,
    /// Where to write the schema after each successful connect
    pub schema_dump: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(service: QueryService) -> Self {
        Self {
            service,
            schema_dump: None,
        }
    }

    pub fn with_schema_dump(mut self, path: Option<PathBuf>) -> Self {
        self.schema_dump = path.map(Arc::new);
        self
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}
