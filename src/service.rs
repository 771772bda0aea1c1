//! Request orchestration.
//!
//! [`QueryService`] ties the pieces together for one question: take the
//! active session, reflect its schema, render the grounding text, ask the
//! translator for SQL, check it with the read-only guard and run it.

use crate::db::{ActiveConnection, ConnectionManager, QueryExecutor, SchemaInspector};
use crate::error::{AppError, AppResult};
use crate::llm::SqlTranslator;
use crate::models::{QueryResponse, SchemaDocument};
use crate::schema_context::SchemaExtractor;
use crate::sql_guard;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct QueryService {
    connections: ConnectionManager,
    translator: Arc<dyn SqlTranslator>,
    executor: QueryExecutor,
    allow_writes: bool,
}

impl QueryService {
    pub fn new(
        connections: ConnectionManager,
        translator: Arc<dyn SqlTranslator>,
        executor: QueryExecutor,
    ) -> Self {
        Self {
            connections,
            translator,
            executor,
            allow_writes: false,
        }
    }

    /// Skip the read-only guard for generated statements.
    pub fn with_allow_writes(mut self, allow_writes: bool) -> Self {
        self.allow_writes = allow_writes;
        self
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Answer a natural-language question against the active database.
    pub async fn ask(&self, question: &str) -> AppResult<QueryResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::validation("Missing query"));
        }

        let start = Instant::now();
        let active = self.connections.current().await?;
        let db_type = active.db_type();

        let extractor = self.extractor(&active).await?;
        let context = extractor.generate_rag_context();
        debug!(
            tables = extractor.description().len(),
            context_len = context.len(),
            "Schema loaded"
        );

        let sql = self
            .translator
            .translate(question, &context, db_type)
            .await
            .inspect_err(|e| warn!(error = %e, "SQL generation failed"))?;
        info!(sql = %sql, "Generated SQL");

        if self.allow_writes {
            debug!("Read-only guard disabled");
        } else {
            sql_guard::validate_readonly(&sql, db_type)
                .inspect_err(|e| warn!(sql = %sql, error = %e, "Generated SQL rejected"))?;
        }

        let result = self.executor.execute(&active.pool, &sql).await?;
        info!(
            rows = result.row_count,
            truncated = result.truncated,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Question answered"
        );

        Ok(QueryResponse::new(sql, result))
    }

    /// Structured schema of the active database.
    pub async fn schema(&self) -> AppResult<SchemaDocument> {
        let active = self.connections.current().await?;
        Ok(self.extractor(&active).await?.extract_full_schema())
    }

    /// Grounding text for the active database.
    pub async fn schema_context(&self) -> AppResult<String> {
        let active = self.connections.current().await?;
        Ok(self.extractor(&active).await?.generate_rag_context())
    }

    /// Reflect the schema of `active` afresh.
    pub async fn extractor(&self, active: &ActiveConnection) -> AppResult<SchemaExtractor> {
        let description = SchemaInspector::reflect(&active.pool).await?;
        Ok(SchemaExtractor::new(description))
    }
}
