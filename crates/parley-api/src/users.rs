use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use parley_types::api::{PhotoResponse, SetNameRequest};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::{Bearer, photo_field};
use crate::session::AppState;

/// PUT /users/me/name
pub async fn set_my_name(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    Json(req): Json<SetNameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = state.identity.clone();
    blocking(move || {
        let user_id = identity.validate_token(&token)?;
        identity.rename_user(&user_id, &req.name)
    })
    .await?;

    Ok(StatusCode::OK)
}

/// PUT /users/me/photo, multipart upload with a `photo` field.
pub async fn set_my_photo(
    State(state): State<AppState>,
    Bearer(token): Bearer,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (filename, bytes) = photo_field(multipart).await?;

    let identity = state.identity.clone();
    let reference = blocking(move || {
        let user_id = identity.validate_token(&token)?;
        identity.set_user_photo(&user_id, &filename, &bytes)
    })
    .await?;

    Ok(Json(PhotoResponse { photo: reference }))
}
