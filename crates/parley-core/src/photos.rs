use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::anyhow;

/// Boundary to the external photo blob store. The core validates the
/// payload (see `media`) and hands it over together with the subject id
/// (a user or group id); the store returns an opaque reference.
pub trait PhotoStore: Send + Sync {
    fn store(&self, subject_id: &str, ext: &str, bytes: &[u8]) -> anyhow::Result<String>;
}

/// In-memory store for tests and development.
#[derive(Default)]
pub struct MemoryPhotoStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl PhotoStore for MemoryPhotoStore {
    fn store(&self, subject_id: &str, ext: &str, bytes: &[u8]) -> anyhow::Result<String> {
        let reference = format!("{subject_id}.{ext}");
        self.blobs
            .lock()
            .map_err(|_| anyhow!("photo store lock poisoned"))?
            .insert(reference.clone(), bytes.to_vec());
        Ok(reference)
    }
}
