//! HTTP transport: the axum router and the server loop.

use crate::error::{AppError, AppResult};
use crate::handlers::{self, AppState};
use axum::Router;
use axum::routing::{get, post};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Build the application router with every route under `api_prefix`.
///
/// `api_prefix` is either empty (routes at the root) or starts with `/`
/// and has no trailing slash.
pub fn router(state: AppState, api_prefix: &str) -> Router {
    let routes = Router::new()
        .route("/connect", post(handlers::connect))
        .route("/query", post(handlers::query))
        .route("/schema", get(handlers::schema))
        .route("/schema/context", get(handlers::schema_context))
        .route("/health", get(handlers::health))
        .route("/disconnect", post(handlers::disconnect))
        .with_state(state);

    // axum refuses to nest at the root
    if api_prefix.is_empty() || api_prefix == "/" {
        routes
    } else {
        Router::new().nest(api_prefix, routes)
    }
}

/// HTTP server for the askdb API.
pub struct HttpTransport {
    state: AppState,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// Normalized route prefix ("" for root)
    api_prefix: String,
}

impl HttpTransport {
    pub fn new(
        state: AppState,
        host: impl Into<String>,
        port: u16,
        api_prefix: impl Into<String>,
    ) -> Self {
        Self {
            state,
            host: host.into(),
            port,
            api_prefix: api_prefix.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Serve until SIGINT or SIGTERM, then close the database session.
    pub async fn run(&self) -> AppResult<()> {
        let bind_addr = self.bind_addr();
        let app = router(self.state.clone(), &self.api_prefix);

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            AppError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        let prefix = if self.api_prefix.is_empty() {
            "/"
        } else {
            self.api_prefix.as_str()
        };
        info!(addr = %bind_addr, prefix = %prefix, "HTTP server listening");

        // In-flight LLM calls can hold requests open, so bound the drain
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = std::sync::Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(AppError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for requests to finish (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database connection");
        self.state.service.connections().close().await;

        Ok(())
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionManager, QueryExecutor};
    use crate::llm::SqlTranslator;
    use crate::models::DatabaseType;
    use crate::service::QueryService;
    use std::sync::Arc;

    struct NoTranslator;

    #[async_trait::async_trait]
    impl SqlTranslator for NoTranslator {
        async fn translate(&self, _: &str, _: &str, _: DatabaseType) -> AppResult<String> {
            Err(AppError::translation("unused"))
        }
    }

    fn state() -> AppState {
        let service = QueryService::new(
            ConnectionManager::default(),
            Arc::new(NoTranslator),
            QueryExecutor::new(),
        );
        AppState::new(service)
    }

    #[test]
    fn test_http_transport_bind_addr() {
        let transport = HttpTransport::new(state(), "0.0.0.0", 3000, "/api");
        assert_eq!(transport.bind_addr(), "0.0.0.0:3000");
        assert_eq!(transport.api_prefix(), "/api");
    }

    #[test]
    fn test_router_builds_with_and_without_prefix() {
        let _ = router(state(), "");
        let _ = router(state(), "/");
        let _ = router(state(), "/api");
    }
}
