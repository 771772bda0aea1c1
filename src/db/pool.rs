//! Connection pool management.
//!
//! askdb talks to one database at a time. The [`ConnectionManager`] owns a
//! single session slot that `/connect` fills and later requests read.
//! Pools are database-specific (MySqlPool, PgPool, SqlitePool) to keep full
//! type support.

use crate::error::{AppError, AppResult};
use crate::models::{ConnectionConfig, ConnectionInfo, DatabaseType};
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgPoolOptions, sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default maximum number of pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default pool acquire/connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySql,
            DbPool::Postgres(_) => DatabaseType::Postgres,
            DbPool::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// Run `SELECT 1` against the pool.
    pub async fn ping(&self) -> AppResult<()> {
        match self {
            DbPool::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ())?,
            DbPool::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ())?,
            DbPool::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ())?,
        }
        Ok(())
    }

    /// Get the server version, if the database reports one.
    pub async fn server_version(&self) -> Option<String> {
        let result = match self {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(pool)
                    .await
            }
        };

        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}

/// Pool sizing shared by every connection the manager opens.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    /// Open SQLite files read-only
    pub read_only: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_only: false,
        }
    }
}

/// The live session: an open pool and the parameters that produced it.
#[derive(Debug)]
pub struct ActiveConnection {
    pub pool: DbPool,
    pub config: ConnectionConfig,
    pub info: ConnectionInfo,
}

impl ActiveConnection {
    pub fn db_type(&self) -> DatabaseType {
        self.config.db_type
    }
}

/// Owner of the single session slot.
///
/// Readers clone the inner `Arc`, so an in-flight query keeps its pool alive
/// while a concurrent connect swaps the slot.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    session: Arc<RwLock<Option<Arc<ActiveConnection>>>>,
    settings: PoolSettings,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            session: Arc::new(RwLock::new(None)),
            settings,
        }
    }

    /// Open a pool for `config` and make it the active session.
    ///
    /// A previous session is replaced. Its pool is closed right away only when
    /// no request still holds it; otherwise it shuts down when the last holder
    /// drops it. On failure the previous session stays in place.
    pub async fn connect(&self, config: ConnectionConfig) -> AppResult<ConnectionInfo> {
        let connection_string = config.connection_string()?;
        let db_type = config.db_type;

        info!(
            db_type = %db_type,
            target = %config.masked_connection_string(),
            "Connecting to database"
        );

        let pool = self.create_pool(db_type, &connection_string).await?;
        let server_version = pool.server_version().await;

        let info = ConnectionInfo {
            database_type: db_type,
            database: config.database.clone(),
            server_version,
            connected_at: chrono::Utc::now(),
        };
        let active = Arc::new(ActiveConnection {
            pool,
            config,
            info: info.clone(),
        });

        let previous = {
            let mut slot = self.session.write().await;
            slot.replace(active)
        }; // Lock released here

        if let Some(previous) = previous {
            release(previous).await;
        }

        info!(
            db_type = %db_type,
            server_version = ?info.server_version,
            "Connected successfully"
        );

        Ok(info)
    }

    /// Get the active session.
    pub async fn current(&self) -> AppResult<Arc<ActiveConnection>> {
        let slot = self.session.read().await;
        slot.as_ref().map(Arc::clone).ok_or(AppError::NotConnected)
    }

    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Check that the active session still answers `SELECT 1`.
    ///
    /// Returns `false` when there is no session or `SELECT 1` fails.
    pub async fn test_connection(&self) -> bool {
        let Ok(active) = self.current().await else {
            return false;
        };

        match active.pool.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, db_type = %active.db_type(), "Connection health check failed");
                false
            }
        }
    }

    /// Close the active session, if any.
    pub async fn close(&self) {
        let previous = {
            let mut slot = self.session.write().await;
            slot.take()
        };

        match previous {
            Some(active) => release(active).await,
            None => debug!("No connection to close"),
        }
    }

    /// Create a connection pool for the given database type.
    async fn create_pool(
        &self,
        db_type: DatabaseType,
        connection_string: &str,
    ) -> AppResult<DbPool> {
        let max_connections = self.settings.max_connections;
        let acquire_timeout = self.settings.connect_timeout;

        match db_type {
            DatabaseType::MySql => {
                let options = MySqlConnectOptions::from_str(connection_string)
                    .map_err(|e| {
                        AppError::connection(
                            format!("Invalid MySQL connection string: {}", e),
                            "Check host, port and database name",
                        )
                    })?
                    .charset("utf8mb4");

                let pool = MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(db_type, &e))?;
                Ok(DbPool::MySql(pool))
            }
            DatabaseType::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(connection_string)
                    .await
                    .map_err(|e| connect_error(db_type, &e))?;
                Ok(DbPool::Postgres(pool))
            }
            DatabaseType::Sqlite => {
                let options = SqliteConnectOptions::from_str(connection_string)
                    .map_err(|e| {
                        AppError::connection(
                            format!("Invalid SQLite connection string: {}", e),
                            "Pass the database file path in the `database` field",
                        )
                    })?
                    .read_only(self.settings.read_only);

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(db_type, &e))?;
                Ok(DbPool::Sqlite(pool))
            }
            DatabaseType::Oracle | DatabaseType::MsSql => Err(AppError::connection(
                format!("No {} driver is bundled with askdb", db_type),
                "Connect to a PostgreSQL, MySQL or SQLite database instead",
            )),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(PoolSettings::default())
    }
}

/// Drop a session taken out of the slot.
///
/// Requests that cloned the session keep using its pool, so it is only
/// closed here when this is the last handle.
async fn release(active: Arc<ActiveConnection>) {
    if Arc::strong_count(&active) == 1 {
        info!(db_type = %active.db_type(), "Closing connection");
        active.pool.close().await;
    } else {
        debug!(
            db_type = %active.db_type(),
            "Connection still in use, closing after the last request"
        );
    }
}

fn connect_error(db_type: DatabaseType, error: &sqlx::Error) -> AppError {
    AppError::connection(
        format!("Failed to connect: {}", error),
        connection_suggestion(db_type, error),
    )
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("unable to open database file") {
        return "Check that the SQLite file exists and is readable".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or set sslmode in params".to_string();
    }

    match db_type.default_port() {
        Some(port) => format!(
            "Verify host and port ({} listens on {} by default)",
            db_type, port
        ),
        None => "Verify the file path exists and is accessible".to_string(),
    }
}
