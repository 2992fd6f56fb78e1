use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use super::api_error;
use crate::error::ApiError;
use crate::models::Requester;
use crate::services::AppState;

pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state
        .statistics
        .snapshot(&requester.user_id)
        .await
        .map_err(api_error(&state))?;

    Ok(Json(snapshot))
}
