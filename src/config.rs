//! Configuration handling for askdb.
//!
//! Settings come from CLI arguments with environment variable fallbacks.
//! `main` loads a `.env` file before parsing, so both sources can live there.

use crate::db::PoolSettings;
use crate::db::pool::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS};
use crate::llm::{DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, LlmSettings};
use crate::models::{DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_API_PREFIX: &str = "/";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.0;

/// Older deployments configure the model through these bare names.
const LEGACY_MODEL_ENV: &str = "model";
const LEGACY_TEMPERATURE_ENV: &str = "temperature";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "askdb",
    about = "Answer natural-language questions against a SQL database using an LLM",
    version,
    author
)]
pub struct Config {
    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "ASKDB_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "ASKDB_HTTP_PORT")]
    pub http_port: u16,

    /// Path prefix for every route (e.g. "/api")
    #[arg(long, default_value = DEFAULT_API_PREFIX, env = "ASKDB_API_PREFIX")]
    pub api_prefix: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "ASKDB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "ASKDB_JSON_LOGS")]
    pub json_logs: bool,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = DEFAULT_LLM_BASE_URL, env = "LLM_BASE_URL")]
    pub llm_base_url: String,

    /// API key sent as a Bearer token
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Model name [env: LLM_MODEL or model]
    #[arg(long, env = "LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Sampling temperature [env: LLM_TEMPERATURE or temperature]
    #[arg(long, env = "LLM_TEMPERATURE")]
    pub llm_temperature: Option<f32>,

    /// LLM request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_LLM_TIMEOUT_SECS, env = "LLM_TIMEOUT")]
    pub llm_timeout: u64,

    /// Query timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, env = "ASKDB_QUERY_TIMEOUT")]
    pub query_timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "ASKDB_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Maximum connections in the pool
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "ASKDB_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Maximum rows returned per query
    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT, env = "ASKDB_MAX_ROWS")]
    pub max_rows: u32,

    /// Run generated statements without the read-only check
    #[arg(long, env = "ASKDB_ALLOW_WRITES")]
    pub allow_writes: bool,

    /// Write the schema here after every successful connect (.json or .txt)
    #[arg(long, value_name = "PATH", env = "ASKDB_SCHEMA_DUMP")]
    pub schema_dump: Option<PathBuf>,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_api_key: None,
            llm_model: None,
            llm_temperature: None,
            llm_timeout: DEFAULT_LLM_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_rows: DEFAULT_ROW_LIMIT,
            allow_writes: false,
            schema_dump: None,
        }
    }

    /// Check value ranges clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }
        if self.max_rows == 0 {
            return Err("max_rows must be greater than 0".to_string());
        }
        if self.query_timeout == 0 {
            return Err("query_timeout must be greater than 0".to_string());
        }
        let temperature = self.resolved_temperature()?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                temperature
            ));
        }
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Route prefix with a leading slash and no trailing slash ("" for root).
    pub fn normalized_api_prefix(&self) -> String {
        let trimmed = self.api_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Model name from `--llm-model`, `LLM_MODEL` or the legacy `model` variable.
    pub fn resolved_model(&self) -> String {
        self.llm_model
            .clone()
            .or_else(|| std::env::var(LEGACY_MODEL_ENV).ok())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string())
    }

    /// Temperature from `--llm-temperature`, `LLM_TEMPERATURE` or the legacy
    /// `temperature` variable.
    pub fn resolved_temperature(&self) -> Result<f32, String> {
        if let Some(t) = self.llm_temperature {
            return Ok(t);
        }
        match std::env::var(LEGACY_TEMPERATURE_ENV) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|_| format!("Invalid temperature value: {}", raw)),
            _ => Ok(DEFAULT_LLM_TEMPERATURE),
        }
    }

    pub fn llm_settings(&self) -> Result<LlmSettings, String> {
        Ok(LlmSettings {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone().filter(|k| !k.trim().is_empty()),
            model: self.resolved_model(),
            temperature: self.resolved_temperature()?,
            timeout: Duration::from_secs(self.llm_timeout),
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            connect_timeout: self.connect_timeout_duration(),
            read_only: !self.allow_writes,
        }
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert!(!config.allow_writes);
        assert!(config.pool_settings().read_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_timeout_durations() {
        let config = Config {
            query_timeout: 60,
            connect_timeout: 15,
            ..Config::default()
        };
        assert_eq!(config.query_timeout_duration(), Duration::from_secs(60));
        assert_eq!(config.pool_settings().connect_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_api_prefix_normalization() {
        let with = |prefix: &str| Config {
            api_prefix: prefix.to_string(),
            ..Config::default()
        };
        assert_eq!(with("/").normalized_api_prefix(), "");
        assert_eq!(with("").normalized_api_prefix(), "");
        assert_eq!(with("api").normalized_api_prefix(), "/api");
        assert_eq!(with("/api/").normalized_api_prefix(), "/api");
        assert_eq!(with("/v1/askdb").normalized_api_prefix(), "/v1/askdb");
    }

    #[test]
    fn test_cli_parsing() {
        let config = Config::try_parse_from([
            "askdb",
            "--http-port",
            "9000",
            "--api-prefix",
            "/api",
            "--llm-model",
            "mixtral",
            "--llm-temperature",
            "0.5",
            "--max-rows",
            "50",
            "--allow-writes",
            "--schema-dump",
            "/tmp/schema.json",
        ])
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.resolved_model(), "mixtral");
        assert_eq!(config.resolved_temperature().unwrap(), 0.5);
        assert_eq!(config.max_rows, 50);
        assert!(config.allow_writes);
        assert!(!config.pool_settings().read_only);
        assert_eq!(config.schema_dump, Some(PathBuf::from("/tmp/schema.json")));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            max_rows: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            llm_temperature: Some(3.5),
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().contains("temperature"));
    }

    #[test]
    fn test_llm_settings_drops_blank_key() {
        let config = Config {
            llm_api_key: Some("  ".to_string()),
            llm_model: Some("llama3-8b-8192".to_string()),
            ..Config::default()
        };
        let settings = config.llm_settings().unwrap();
        assert!(settings.api_key.is_none());
        assert_eq!(settings.model, "llama3-8b-8192");
    }
}
