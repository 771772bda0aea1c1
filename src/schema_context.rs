//! Schema rendering: structured documents and language-model context.
//!
//! [`SchemaExtractor`] turns a reflected [`SchemaDescription`] into either a
//! [`SchemaDocument`] (JSON) or a plain-text description with one paragraph
//! per table, which is handed to the translator as grounding context.

use crate::error::{AppError, AppResult};
use crate::models::{SCHEMA_VERSION, SchemaDescription, SchemaDocument, SchemaMetadata, TableSchema};
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Output format for [`SchemaExtractor::save_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Json,
    Txt,
}

impl SchemaFormat {
    /// Pick the format from a file extension (`.json` or `.txt`).
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for SchemaFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "txt" => Ok(Self::Txt),
            other => Err(AppError::validation(format!(
                "Unsupported schema format '{}'. Supported formats are 'json' and 'txt'",
                other
            ))),
        }
    }
}

/// Renders a reflected schema snapshot.
#[derive(Debug, Clone)]
pub struct SchemaExtractor {
    schema: SchemaDescription,
}

impl SchemaExtractor {
    pub fn new(schema: SchemaDescription) -> Self {
        Self { schema }
    }

    pub fn description(&self) -> &SchemaDescription {
        &self.schema
    }

    /// Build the structured schema document.
    pub fn extract_full_schema(&self) -> SchemaDocument {
        SchemaDocument {
            tables: self.schema.clone(),
            metadata: SchemaMetadata {
                number_of_tables: self.schema.len(),
                schema_version: SCHEMA_VERSION,
            },
        }
    }

    /// Render the schema as natural-language context for the translator.
    pub fn generate_rag_context(&self) -> String {
        let mut lines = vec![
            "Database Schema Description:".to_string(),
            format!("This database contains {} tables.\n", self.schema.len()),
        ];

        for table in self.schema.tables() {
            describe_table(table, &mut lines);
        }

        lines.join("\n")
    }

    /// Write the schema to `path` in the given format.
    pub async fn save_schema(&self, path: impl AsRef<Path>, format: SchemaFormat) -> AppResult<()> {
        let path = path.as_ref();
        let contents = match format {
            SchemaFormat::Json => serde_json::to_string_pretty(&self.extract_full_schema())
                .map_err(|e| AppError::internal(format!("Failed to serialize schema: {}", e)))?,
            SchemaFormat::Txt => self.generate_rag_context(),
        };

        tokio::fs::write(path, contents).await?;
        info!(path = %path.display(), format = ?format, "Schema saved");
        Ok(())
    }

    /// Like [`save_schema`](Self::save_schema) with the format given as a
    /// token (`"json"` or `"txt"`). An unknown token fails before any file
    /// is touched.
    pub async fn save_schema_as(&self, path: impl AsRef<Path>, format: &str) -> AppResult<()> {
        let format = format.parse::<SchemaFormat>()?;
        self.save_schema(path, format).await
    }
}

fn describe_table(table: &TableSchema, lines: &mut Vec<String>) {
    lines.push(format!("Table: {}", table.table_name));
    lines.push("Columns:".to_string());

    for column in &table.columns {
        let mut line = format!("- {} ({})", column.name, column.data_type);
        if column.primary_key {
            line.push_str(" [Primary Key]");
        }
        if !column.nullable {
            line.push_str(" [Required]");
        }
        if let Some(fk) = &column.foreign_key {
            let _ = write!(
                line,
                " [References {}.{}]",
                fk.references_table, fk.references_column
            );
        }
        lines.push(line);
    }

    if !table.constraints.is_empty() {
        lines.push("\nConstraints:".to_string());
        for constraint in &table.constraints {
            lines.push(format!(
                "- {} on columns: {}",
                constraint.kind,
                constraint.columns.join(", ")
            ));
        }
    }

    if !table.indexes.is_empty() {
        lines.push("\nIndexes:".to_string());
        for index in &table.indexes {
            let prefix = if index.unique { "UNIQUE " } else { "" };
            lines.push(format!(
                "- {}Index on columns: {}",
                prefix,
                index.columns.join(", ")
            ));
        }
    }

    lines.push(String::new());
}
