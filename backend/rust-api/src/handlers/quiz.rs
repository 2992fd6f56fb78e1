use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use super::api_error;
use crate::error::ApiError;
use crate::extractors::AppJson;
use crate::models::history::SubmitTestRequest;
use crate::models::test_definition::GenerateTestRequest;
use crate::models::Requester;
use crate::services::AppState;

pub async fn generate_test(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    AppJson(req): AppJson<GenerateTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Generating test for user_id={}, topic={:?}, tier={:?}",
        requester.user_id,
        req.topic_id.as_deref().or(req.custom_topic_name.as_deref()),
        req.difficulty_tier
    );

    let view = state
        .tests
        .generate_test(&requester, req)
        .await
        .map_err(api_error(&state))?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_test(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .tests
        .learner_view(&requester, &test_id)
        .await
        .map_err(api_error(&state))?;

    Ok(Json(view))
}

pub async fn review_test(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .tests
        .authoritative_view(&requester, &test_id)
        .await
        .map_err(api_error(&state))?;

    Ok(Json(view))
}

pub async fn submit_test(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    Path(test_id): Path<String>,
    AppJson(req): AppJson<SubmitTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Submitting test {} for user_id={} ({} answers)",
        test_id,
        requester.user_id,
        req.answers.len()
    );

    let result = state
        .scoring
        .submit(&requester, &test_id, req)
        .await
        .map_err(api_error(&state))?;

    Ok(Json(result))
}
