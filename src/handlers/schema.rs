use super::AppState;
use crate::error::AppResult;
use crate::models::SchemaDocument;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SchemaContextResponse {
    pub context: String,
}

/// `GET /schema`
pub async fn schema(State(state): State<AppState>) -> AppResult<Json<SchemaDocument>> {
    Ok(Json(state.service.schema().await?))
}

/// `GET /schema/context`: the text the translator is grounded on.
pub async fn schema_context(
    State(state): State<AppState>,
) -> AppResult<Json<SchemaContextResponse>> {
    let context = state.service.schema_context().await?;
    Ok(Json(SchemaContextResponse { context }))
}
