//! File-backed draft store: one `<key>.json` file per key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::StoreError;

use super::traits::{keys, DraftStore};

/// Drafts kept as files under a directory, surviving process restarts.
pub struct FileDraftStore {
    base_path: PathBuf,
}

impl FileDraftStore {
    /// Create a store rooted at `base_path`. The directory is created on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.json"))
    }
}

/// Keys become file names, so only plain identifiers are accepted.
fn check_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(StoreError::Write {
            key: key.to_string(),
            reason: "key must be a plain identifier".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn get(&self, key: &str) -> Option<String> {
        check_key(key).ok()?;
        let path = self.resolve_path(key);
        match fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "Failed to read stored draft");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        check_key(key)?;
        fs::create_dir_all(&self.base_path).await?;
        let path = self.resolve_path(key);
        // Sibling temp file, then rename over the target.
        let tmp = self.base_path.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        debug!(key, path = %path.display(), "Draft written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        match fs::remove_file(self.resolve_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        for key in keys::ALL {
            self.remove(key).await?;
        }
        debug!(path = %self.base_path.display(), "Draft store cleared");
        Ok(())
    }
}
