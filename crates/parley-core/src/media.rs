//! Photo payload validation. Stateless: everything is checked per call,
//! there is no shared validator instance.

use crate::error::{CoreError, CoreResult};

pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Check a photo upload's declared extension and size. Returns the
/// normalized (lowercase) extension for the storage layer.
pub fn validate_photo(filename: &str, bytes: &[u8]) -> CoreResult<String> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| {
            CoreError::UnsupportedMedia(format!("file {filename:?} has no extension"))
        })?;

    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CoreError::UnsupportedMedia(
            "only PNG, JPG, and JPEG images are allowed".into(),
        ));
    }

    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(CoreError::PayloadTooLarge {
            size: bytes.len(),
            limit: MAX_PHOTO_BYTES,
        });
    }

    Ok(ext)
}
