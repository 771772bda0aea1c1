//! askdb library
//!
//! Answers natural-language questions against a SQL database: the schema of
//! the connected database is reflected into plain text, a language model
//! turns the question into SQL, and the statement runs read-only against
//! the database (SQLite, PostgreSQL, MySQL).

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod schema_context;
pub mod service;
pub mod sql_guard;
pub mod transport;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use service::QueryService;
