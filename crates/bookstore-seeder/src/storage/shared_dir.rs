// Shared-volume image store
//
// Mirrors `{external_id}/{file_name}` under a directory that the web
// application serves from. The stored reference is the relative key.
// Every run rewrites the copy, so a changed source image replaces it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ImageStore;

#[derive(Debug, Clone)]
pub struct SharedDirStore {
    root: PathBuf,
}

impl SharedDirStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

#[async_trait]
impl ImageStore for SharedDirStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    fn object_key(&self, external_id: &str, file_name: &str) -> String {
        format!("{}/{}", external_id, file_name)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .with_context(|| format!("Failed to stat {}", key))
    }

    fn reuses_existing(&self) -> bool {
        false
    }

    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let dest = self.path_for(key);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        debug!("Writing {} bytes to {}", data.len(), dest.display());

        tokio::fs::write(&dest, data)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))
    }

    fn public_ref(&self, key: &str) -> String {
        key.to_string()
    }
}
