use super::AppState;
use crate::error::AppResult;
use crate::models::{QueryRequest, QueryResponse};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

/// `POST /query`: answer a natural-language question.
pub async fn query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> AppResult<Json<QueryResponse>> {
    let Json(request) = body?;
    let response = state.service.ask(&request.query).await?;
    Ok(Json(response))
}
