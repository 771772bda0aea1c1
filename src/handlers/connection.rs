use super::AppState;
use crate::error::AppResult;
use crate::models::{ConnectionConfig, ConnectionInfo};
use crate::schema_context::SchemaFormat;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub message: String,
    pub connection: ConnectionInfo,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connected: bool,
    pub healthy: bool,
}

/// `POST /connect`: open a database and make it the active session.
pub async fn connect(
    State(state): State<AppState>,
    body: Result<Json<ConnectionConfig>, JsonRejection>,
) -> AppResult<Json<ConnectResponse>> {
    let Json(config) = body?;
    let db_type = config.db_type;

    let connection = state.service.connections().connect(config).await?;

    if let Some(path) = &state.schema_dump {
        dump_schema(&state, path).await;
    }

    Ok(Json(ConnectResponse {
        message: format!("Successfully connected to the {}", db_type),
        connection,
    }))
}

/// A failed dump is logged and does not fail the connect.
async fn dump_schema(state: &AppState, path: &Path) {
    match write_schema(state, path).await {
        Ok(()) => info!(path = %path.display(), "Schema dump written"),
        Err(e) => warn!(path = %path.display(), error = %e, "Schema dump failed"),
    }
}

async fn write_schema(state: &AppState, path: &Path) -> AppResult<()> {
    let format = SchemaFormat::from_path(path)?;
    let active = state.service.connections().current().await?;
    let extractor = state.service.extractor(&active).await?;
    extractor.save_schema(path, format).await
}

/// `POST /disconnect`: close the active session, if any.
pub async fn disconnect(State(state): State<AppState>) -> Json<MessageResponse> {
    let connections = state.service.connections();
    let message = if connections.is_connected().await {
        connections.close().await;
        "Disconnected"
    } else {
        "No active connection"
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.service.connections();
    let connected = connections.is_connected().await;
    let healthy = connected && connections.test_connection().await;

    Json(HealthResponse {
        status: "ok",
        connected,
        healthy,
    })
}
