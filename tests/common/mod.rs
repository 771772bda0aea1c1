//! Shared helpers for integration tests.

#![allow(dead_code)]

use askdb::AppResult;
use askdb::llm::SqlTranslator;
use askdb::models::DatabaseType;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::sync::Mutex;

/// Create a SQLite file in `dir`, run `statements` against it and return its path.
pub async fn sqlite_file(dir: &tempfile::TempDir, name: &str, statements: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create SQLite file");
    for stmt in statements {
        sqlx::query(stmt)
            .execute(&pool)
            .await
            .expect("Failed to run setup statement");
    }
    pool.close().await;
    path
}

/// Shop schema used across tests.
pub const SHOP_SCHEMA: &[&str] = &[
    "CREATE TABLE orders (id INTEGER PRIMARY KEY NOT NULL, customer TEXT)",
    "CREATE TABLE order_items (id INTEGER PRIMARY KEY, order_id INTEGER REFERENCES orders(id), qty INTEGER NOT NULL)",
    "CREATE TABLE notes (body TEXT, score REAL)",
    "INSERT INTO orders (id, customer) VALUES (1, 'ada'), (2, 'grace')",
    "INSERT INTO order_items (order_id, qty) VALUES (1, 3), (1, 1), (2, 5)",
];

/// Translator that returns a fixed statement and records what it was asked.
pub struct FixedTranslator {
    sql: String,
    pub calls: Mutex<Vec<(String, String, DatabaseType)>>,
}

impl FixedTranslator {
    pub fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl SqlTranslator for FixedTranslator {
    async fn translate(
        &self,
        question: &str,
        schema_context: &str,
        db_type: DatabaseType,
    ) -> AppResult<String> {
        self.calls.lock().unwrap().push((
            question.to_string(),
            schema_context.to_string(),
            db_type,
        ));
        Ok(self.sql.clone())
    }
}
