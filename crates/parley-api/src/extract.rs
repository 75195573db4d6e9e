use axum::extract::FromRequestParts;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::{header, request::Parts};
use parley_core::CoreError;

use crate::error::ApiError;

/// Session token from the Authorization header. Accepts both a bare token
/// and the `Bearer ` prefix.
pub struct Bearer(pub String);

impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ApiError(CoreError::Unauthorized(
                    "missing Authorization header".into(),
                ))
            })?;

        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if token.is_empty() {
            return Err(ApiError(CoreError::Unauthorized(
                "empty session token".into(),
            )));
        }
        Ok(Self(token.to_string()))
    }
}

/// Pull the `photo` file out of a multipart upload. Returns the declared
/// filename (the core validates its extension) and the raw bytes.
pub async fn photo_field(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(unreadable_form)? {
        if field.name() == Some("photo") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(unreadable_form)?;
            return Ok((filename, bytes.to_vec()));
        }
    }
    Err(ApiError(CoreError::Validation(
        "missing or invalid photo file in the request".into(),
    )))
}

fn unreadable_form(err: MultipartError) -> ApiError {
    ApiError(CoreError::Validation(format!(
        "unable to parse form data: {err}"
    )))
}
