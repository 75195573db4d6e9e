use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use parley_core::CoreError;
use parley_types::api::{CreateConversationRequest, CreateConversationResponse};
use parley_types::models::ConversationKind;

use crate::blocking;
use crate::error::ApiError;
use crate::extract::Bearer;
use crate::session::AppState;

/// GET /conversations: the caller's conversations, most recent first.
pub async fn list_mine(
    State(state): State<AppState>,
    Bearer(token): Bearer,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let summaries = blocking(move || registry.list_for(&token)).await?;
    Ok(Json(summaries))
}

/// GET /conversations/{id}: full conversation with ordered messages.
pub async fn get_one(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let detail = blocking(move || registry.get(&token, &id)).await?;
    Ok(Json(detail))
}

/// POST /conversations: open a direct conversation (idempotent per peer
/// pair) or create a group.
pub async fn create(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    let id = blocking(move || match req.kind {
        ConversationKind::Direct => {
            let peer = req.peer_id.as_deref().ok_or_else(|| {
                CoreError::Validation("peerId is required for direct conversations".into())
            })?;
            registry.create_direct(&token, peer)
        }
        ConversationKind::Group => {
            let name = req
                .name
                .as_deref()
                .ok_or_else(|| CoreError::Validation("name is required for groups".into()))?;
            registry.create_group(&token, name, &req.member_ids)
        }
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            conversation_id: id,
        }),
    ))
}
