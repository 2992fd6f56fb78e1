use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use super::api_error;
use crate::error::{ApiError, EngineError};
use crate::extractors::AppJson;
use crate::models::progress::{SaveProgressRequest, SaveProgressResponse};
use crate::models::Requester;
use crate::services::AppState;

pub async fn save_progress(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    Path(test_id): Path<String>,
    AppJson(req): AppJson<SaveProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .progress
        .save(&requester.user_id, &test_id, req)
        .await
        .map_err(api_error(&state))?;

    Ok(Json(SaveProgressResponse::from(outcome)))
}

pub async fn list_progress(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = state
        .progress
        .list(&requester.user_id)
        .await
        .map_err(api_error(&state))?;

    Ok(Json(summaries))
}

pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .progress
        .get(&requester.user_id, &test_id)
        .await
        .map_err(api_error(&state))?;

    Ok(Json(SaveProgressResponse::from(
        crate::models::SaveOutcome::InProgress(record),
    )))
}

pub async fn delete_progress(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let existed = state
        .progress
        .delete(&requester.user_id, &test_id)
        .await
        .map_err(api_error(&state))?;

    if existed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(&state)(EngineError::not_found("Progress not found")))
    }
}
