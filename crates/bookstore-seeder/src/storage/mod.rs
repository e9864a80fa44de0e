//! Image store backends
//!
//! Book images end up either in a directory shared with the web application
//! or in an S3 bucket. Both sit behind [`ImageStore`]. [`publish_image`]
//! checks the bucket before uploading, so an object that is already
//! published is never transferred again; the shared directory is always
//! rewritten so a changed or truncated copy gets replaced.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

pub mod config;
pub mod s3;
pub mod shared_dir;

pub use config::{ImageStoreKind, S3Settings, StorageConfig};
pub use s3::S3ImageStore;
pub use shared_dir::SharedDirStore;

/// Extensions accepted as book images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "webp"];

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Short backend name for log lines
    fn backend(&self) -> &'static str;

    /// Key under which the image of one source book is stored
    fn object_key(&self, external_id: &str, file_name: &str) -> String;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Whether an existing object under a key is reused instead of rewritten
    fn reuses_existing(&self) -> bool {
        true
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// Reference recorded in the image table for `key`
    fn public_ref(&self, key: &str) -> String;
}

/// Publish a local file under `key`, skipping the transfer when the store
/// reuses existing objects and already has it. Returns the reference to record.
pub async fn publish_image(store: &dyn ImageStore, key: &str, path: &Path) -> Result<String> {
    if store.reuses_existing() && store.exists(key).await? {
        debug!(backend = store.backend(), key, "Image already published, reusing");
        return Ok(store.public_ref(key));
    }

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let content_type = content_type_for(path);

    store.put(key, data, content_type).await?;

    Ok(store.public_ref(key))
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Build the configured backend. `None` means the image stage is skipped.
pub fn build_store(config: &StorageConfig) -> Option<Box<dyn ImageStore>> {
    match config.kind {
        ImageStoreKind::Filesystem => Some(Box::new(SharedDirStore::new(&config.shared_dir))),
        ImageStoreKind::S3 => match config.s3_settings() {
            Some(settings) => Some(Box::new(S3ImageStore::new(settings))),
            None => {
                warn!(
                    "S3 image store selected but credentials or bucket name are missing; \
                     skipping images"
                );
                None
            }
        },
    }
}
