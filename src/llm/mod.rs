//! Natural-language to SQL translation.
//!
//! [`SqlTranslator`] is the seam between the service and the language
//! model. [`ChatCompletionTranslator`] talks to any OpenAI-compatible chat
//! completion endpoint (Groq by default); tests plug in their own stubs.

mod openai;

pub use openai::{ChatCompletionTranslator, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, LlmSettings};

use crate::error::{AppError, AppResult};
use crate::models::DatabaseType;
use async_trait::async_trait;

/// Translates a question into a single SQL statement.
#[async_trait]
pub trait SqlTranslator: Send + Sync {
    /// Produce one SQL statement answering `question`, grounded on
    /// `schema_context` and written for `db_type`.
    async fn translate(
        &self,
        question: &str,
        schema_context: &str,
        db_type: DatabaseType,
    ) -> AppResult<String>;
}

/// System message sent with every translation request.
pub const SYSTEM_PROMPT: &str = "You translate questions about a relational database into SQL. \
Reply with exactly one SQL statement and nothing else: no explanation and no Markdown.";

/// Build the user message for a translation request.
pub fn build_prompt(question: &str, schema_context: &str, db_type: DatabaseType) -> String {
    format!(
        "Write a single {dialect} SQL query that answers the question below.\n\
         Use only the tables and columns described in the schema.\n\
         Return only the SQL statement.\n\n\
         {schema}\n\
         Question: {question}\n\
         SQL:",
        dialect = db_type.display_name(),
        schema = schema_context.trim_end(),
        question = question.trim(),
    )
}

/// Clean a model reply down to the bare SQL statement.
///
/// Strips Markdown code fences, a leading `SQL:` label, surrounding
/// whitespace and trailing semicolons.
pub fn extract_sql(reply: &str) -> AppResult<String> {
    let mut text = reply.trim();

    // Prefer the body of the first fenced block when there is one
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body = match after.find('\n') {
            Some(nl) => {
                let info = &after[..nl];
                // ```sql or ``` on its own line
                if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
                    &after[nl + 1..]
                } else {
                    after
                }
            }
            None => after,
        };
        text = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        text = text.trim();
    }

    if let Some(label) = text.get(..4) {
        if label.eq_ignore_ascii_case("sql:") {
            text = text[4..].trim_start();
        }
    }

    let sql = text.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if sql.is_empty() {
        return Err(AppError::translation("Language model returned no SQL"));
    }
    Ok(sql.to_string())
}
