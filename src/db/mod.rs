//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management and the active session
//! - Query execution
//! - Schema reflection
//! - Type mappings

pub mod executor;
pub mod pool;
pub mod schema;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ActiveConnection, ConnectionManager, DbPool, PoolSettings};
pub use schema::SchemaInspector;
