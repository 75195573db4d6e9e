use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use parley_core::photos::PhotoStore;

/// Disk-backed photo store: one file per subject, overwritten on change.
/// All calls happen under `spawn_blocking`, so plain `std::fs` is fine.
pub struct DiskPhotoStore {
    dir: PathBuf,
}

impl DiskPhotoStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        info!("Photo storage directory: {}", dir.display());
        Ok(Self { dir })
    }
}

impl PhotoStore for DiskPhotoStore {
    fn store(&self, subject_id: &str, ext: &str, bytes: &[u8]) -> Result<String> {
        // subject ids are caller-supplied; the file name must not escape
        // the photo directory
        let safe: String = subject_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let reference = format!("{safe}.{ext}");
        std::fs::write(self.dir.join(&reference), bytes)?;
        Ok(reference)
    }
}
