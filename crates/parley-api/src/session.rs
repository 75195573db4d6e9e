use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use parley_core::conversations::ConversationRegistry;
use parley_core::identity::IdentityStore;
use parley_core::messages::MessageLedger;
use parley_types::api::{LoginRequest, LoginResponse};

use crate::blocking;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub identity: IdentityStore,
    pub registry: ConversationRegistry,
    pub ledger: MessageLedger,
}

/// POST /session: log in, creating the user on first sight.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = state.identity.clone();
    let login = blocking(move || identity.login_or_create(&req.id, &req.name)).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            identifier: login.user_id,
            token: login.token,
        }),
    ))
}
