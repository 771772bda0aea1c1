//! OpenAI-compatible chat completion client.

use super::{SYSTEM_PROMPT, SqlTranslator, build_prompt, extract_sql};
use crate::error::{AppError, AppResult};
use crate::models::DatabaseType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Groq's OpenAI-compatible API.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Connection settings for the completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// [`SqlTranslator`] backed by `POST {base_url}/chat/completions`.
pub struct ChatCompletionTranslator {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl ChatCompletionTranslator {
    pub fn new(settings: LlmSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        if settings.api_key.is_none() {
            warn!(base_url = %settings.base_url, "No LLM API key configured");
        }

        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn map_send_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::timeout("llm request", self.settings.timeout.as_secs())
        } else {
            AppError::translation(format!("LLM request failed: {}", err))
        }
    }
}

#[async_trait]
impl SqlTranslator for ChatCompletionTranslator {
    async fn translate(
        &self,
        question: &str,
        schema_context: &str,
        db_type: DatabaseType,
    ) -> AppResult<String> {
        let prompt = build_prompt(question, schema_context, db_type);
        let body = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        debug!(model = %self.settings.model, prompt_len = prompt.len(), "Requesting SQL translation");

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key.trim());
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::translation(format!(
                "LLM endpoint returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let reply: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                AppError::translation(format!("Malformed LLM response: {}", e))
            }
        })?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::translation("LLM response contained no message"))?;

        extract_sql(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::{Value, json};

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn settings(base_url: String) -> LlmSettings {
        LlmSettings {
            base_url,
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            temperature: 0.0,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_translate_parses_completion() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let content = if auth == "Bearer test-key" && body["model"] == "test-model" {
                    "```sql\nSELECT COUNT(*) FROM users;\n```"
                } else {
                    "SELECT 'bad request'"
                };
                axum::Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }))
            }),
        );
        let base_url = serve(router).await;

        let translator = ChatCompletionTranslator::new(settings(base_url)).unwrap();
        let sql = translator
            .translate("How many users?", "Table: users", DatabaseType::Sqlite)
            .await
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM users");
    }

    #[tokio::test]
    async fn test_translate_http_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
        );
        let base_url = serve(router).await;

        let translator = ChatCompletionTranslator::new(settings(base_url)).unwrap();
        let err = translator
            .translate("q", "", DatabaseType::Postgres)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Translation { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_translate_no_choices() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { axum::Json(json!({"choices": []})) }),
        );
        let base_url = serve(router).await;

        let translator = ChatCompletionTranslator::new(settings(base_url)).unwrap();
        let err = translator
            .translate("q", "", DatabaseType::MySql)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Translation { .. }));
    }
}
