use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use parley_types::api::{ForwardMessageRequest, SendMessageRequest, SendMessageResponse};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::Bearer;
use crate::session::AppState;

/// POST /messages
pub async fn send(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ledger = state.ledger.clone();
    let id =
        blocking(move || ledger.send(&token, &req.conversation_id, &req.content)).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse { message_id: id }),
    ))
}

/// POST /messages/{id}/forward
pub async fn forward(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
    Json(req): Json<ForwardMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ledger = state.ledger.clone();
    let copy_id =
        blocking(move || ledger.forward(&token, &id, &req.to_conversation_id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message_id: copy_id,
        }),
    ))
}

/// DELETE /messages/{id}. Author-only tombstone; repeats are absorbed.
pub async fn delete_message(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ledger = state.ledger.clone();
    blocking(move || ledger.delete(&token, &id)).await?;
    Ok(StatusCode::OK)
}
