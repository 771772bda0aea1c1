//! Connection-related data models.
//!
//! This module defines the database kinds askdb knows about and the
//! connection parameters posted to `/connect`.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgres,
    /// Includes MariaDB
    #[serde(rename = "mysql", alias = "mysql+pymysql", alias = "mariadb")]
    MySql,
    #[serde(rename = "oracle", alias = "oracle+cx_oracle")]
    Oracle,
    #[serde(
        rename = "mssql",
        alias = "mssql+pyodbc",
        alias = "sqlserver",
        alias = "sql_server"
    )]
    MsSql,
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl DatabaseType {
    /// URL scheme used in connection strings for this database type.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Oracle => "oracle",
            Self::MsSql => "mssql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::Oracle => "Oracle",
            Self::MsSql => "SQL Server",
            Self::Sqlite => "SQLite",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::MySql => Some(3306),
            Self::Oracle => Some(1521),
            Self::MsSql => Some(1433),
            Self::Sqlite => None,
        }
    }

    /// True when askdb ships a driver that can open this database type.
    pub fn has_driver(&self) -> bool {
        matches!(self, Self::Postgres | Self::MySql | Self::Sqlite)
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Parameters for a database connection, as posted to `/connect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    #[serde(default)]
    pub username: Option<String>,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    /// Database name, or the file path for SQLite
    #[serde(default)]
    pub database: Option<String>,
    /// Extra driver parameters appended to the connection string query.
    #[serde(default, alias = "connection_params")]
    pub params: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Create a SQLite configuration for the given file path.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            username: None,
            password: None,
            host: None,
            port: None,
            database: Some(path.into()),
            params: BTreeMap::new(),
        }
    }

    /// Create a server configuration (PostgreSQL, MySQL, Oracle, SQL Server).
    pub fn server(
        db_type: DatabaseType,
        username: impl Into<String>,
        password: Option<String>,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
    ) -> Self {
        Self {
            db_type,
            username: Some(username.into()),
            password,
            host: Some(host.into()),
            port: Some(port),
            database: Some(database.into()),
            params: BTreeMap::new(),
        }
    }

    /// Add an extra driver parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Check that the fields required by the database type are present.
    pub fn validate(&self) -> AppResult<()> {
        let mut missing = Vec::new();
        if is_blank(&self.database) {
            missing.push("database");
        }
        if self.db_type != DatabaseType::Sqlite {
            if is_blank(&self.username) {
                missing.push("username");
            }
            if is_blank(&self.host) {
                missing.push("host");
            }
            if self.port.is_none() {
                missing.push("port");
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "{} connection requires: {}",
                self.db_type,
                missing.join(", ")
            )))
        }
    }

    /// Build the provider-specific connection string.
    pub fn connection_string(&self) -> AppResult<String> {
        self.validate()?;
        match self.db_type {
            DatabaseType::Sqlite => Ok(self.sqlite_connection_string()),
            DatabaseType::Postgres => self.server_connection_string(DatabaseType::Postgres),
            DatabaseType::MySql => self.server_connection_string(DatabaseType::MySql),
            DatabaseType::Oracle => self.server_connection_string(DatabaseType::Oracle),
            DatabaseType::MsSql => self.server_connection_string(DatabaseType::MsSql),
        }
    }

    fn sqlite_connection_string(&self) -> String {
        format!("sqlite://{}", self.database.as_deref().unwrap_or_default())
    }

    fn server_connection_string(&self, db_type: DatabaseType) -> AppResult<String> {
        let host = self.host.as_deref().unwrap_or_default();
        let port = self.port.unwrap_or_default();
        let invalid = |what: &str| {
            AppError::validation(format!("Invalid {} in {} connection", what, db_type))
        };

        let mut url = Url::parse(&format!("{}://{}:{}", db_type.scheme(), host, port))
            .map_err(|e| AppError::validation(format!("Invalid host '{}': {}", host, e)))?;

        url.set_username(self.username.as_deref().unwrap_or_default())
            .map_err(|_| invalid("username"))?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| invalid("password"))?;
        }
        url.path_segments_mut()
            .map_err(|_| invalid("database"))?
            .push(self.database.as_deref().unwrap_or_default());

        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }

        Ok(url.to_string())
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        let connection_string = match self.connection_string() {
            Ok(s) => s,
            Err(_) => return format!("{}://<invalid>", self.db_type.scheme()),
        };
        if let Some(at_pos) = connection_string.find('@') {
            let scheme_end = connection_string.find("://").map(|p| p + 3).unwrap_or(0);
            if let Some(colon_pos) = connection_string[scheme_end..at_pos].rfind(':') {
                let prefix = &connection_string[..scheme_end + colon_pos + 1];
                let suffix = &connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        connection_string
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Accept the port either as a JSON number or as a numeric string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortInput {
        Number(u16),
        Text(String),
    }

    match Option::<PortInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortInput::Number(n)) => Ok(Some(n)),
        Some(PortInput::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(PortInput::Text(s)) => s
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", s))),
    }
}

/// Information about the active connection, returned after a successful connect.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub database_type: DatabaseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}
