use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use parley_types::api::CommentRequest;

use crate::blocking;
use crate::error::ApiError;
use crate::extract::Bearer;
use crate::session::AppState;

/// POST /messages/{id}/comment. A second reaction from the same user
/// replaces the first.
pub async fn comment(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ledger = state.ledger.clone();
    blocking(move || ledger.react(&token, &id, &req.emoji)).await?;
    Ok(StatusCode::CREATED)
}

/// DELETE /messages/{id}/comment. Removes the caller's reaction; absence
/// is a no-op success.
pub async fn uncomment(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ledger = state.ledger.clone();
    blocking(move || ledger.unreact(&token, &id)).await?;
    Ok(StatusCode::OK)
}
