use std::path::PathBuf;

use crate::error::{Result, SeedError};

pub const DEFAULT_SHARED_IMAGES_DIR: &str = "/shared_data/images";
pub const DEFAULT_S3_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStoreKind {
    /// Copy into a directory shared with the web application
    Filesystem,
    /// Upload into an S3 bucket
    S3,
}

impl std::str::FromStr for ImageStoreKind {
    type Err = SeedError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filesystem" | "fs" | "shared" => Ok(ImageStoreKind::Filesystem),
            "s3" | "object" => Ok(ImageStoreKind::S3),
            other => Err(SeedError::Config(format!(
                "IMAGE_STORE must be 'filesystem' or 's3', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct StorageConfig {
    pub kind: ImageStoreKind,
    pub shared_dir: PathBuf,
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("kind", &self.kind)
            .field("shared_dir", &self.shared_dir)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key.as_ref().map(|_| "<set>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<set>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Complete S3 connection settings
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("path_style", &self.path_style)
            .finish_non_exhaustive()
    }
}

impl StorageConfig {
    /// `IMAGE_STORE` picks the backend; when unset, a configured bucket
    /// selects S3 and everything else falls back to the shared directory.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bucket = non_empty("AWS_S3_BUCKET_NAME");

        let kind = match non_empty("IMAGE_STORE") {
            Some(raw) => raw.parse()?,
            None if bucket.is_some() => ImageStoreKind::S3,
            None => ImageStoreKind::Filesystem,
        };

        Ok(Self {
            kind,
            shared_dir: non_empty("SEED_SHARED_IMAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SHARED_IMAGES_DIR)),
            endpoint: non_empty("S3_ENDPOINT"),
            region: non_empty("AWS_REGION").unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            bucket,
            access_key: non_empty("AWS_ACCESS_KEY_ID"),
            secret_key: non_empty("AWS_SECRET_ACCESS_KEY"),
            path_style: non_empty("S3_PATH_STYLE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }

    /// S3 settings, or `None` when credentials or the bucket are missing
    pub fn s3_settings(&self) -> Option<S3Settings> {
        Some(S3Settings {
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            bucket: self.bucket.clone()?,
            access_key: self.access_key.clone()?,
            secret_key: self.secret_key.clone()?,
            path_style: self.path_style,
        })
    }
}
