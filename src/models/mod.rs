//! Data models for askdb.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionInfo, DatabaseType};
pub use query::{
    DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, JsonRow, MAX_ROW_LIMIT, QueryRequest,
    QueryResponse, QueryResult,
};
pub use schema::{
    ColumnInfo, ConstraintInfo, ConstraintKind, ForeignKeyRef, IndexInfo, SCHEMA_VERSION,
    SchemaDescription, SchemaDocument, SchemaMetadata, TableSchema,
};
