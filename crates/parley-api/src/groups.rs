use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use parley_types::api::{AddMemberRequest, GroupNameRequest, PhotoResponse};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::{Bearer, photo_field};
use crate::session::AppState;

/// POST /groups/{id}/leave
pub async fn leave(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    blocking(move || registry.leave(&token, &id)).await?;
    Ok(StatusCode::OK)
}

/// PUT /groups/{id}/name
pub async fn set_name(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
    Json(req): Json<GroupNameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    blocking(move || registry.rename_group(&token, &id, &req.name)).await?;
    Ok(StatusCode::OK)
}

/// PUT /groups/{id}/photo, multipart upload with a `photo` field.
pub async fn set_photo(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (filename, bytes) = photo_field(multipart).await?;

    let registry = state.registry.clone();
    let reference =
        blocking(move || registry.set_group_photo(&token, &id, &filename, &bytes)).await?;

    Ok(Json(PhotoResponse { photo: reference }))
}

/// POST /groups/{id}/members. Any participant may add; re-adding a
/// member is absorbed as success.
pub async fn add_member(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.clone();
    blocking(move || registry.add_member(&token, &id, &req.user_id)).await?;
    Ok(StatusCode::OK)
}
