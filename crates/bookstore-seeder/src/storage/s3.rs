use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};

use super::{config::S3Settings, ImageStore};

/// Key prefix for book images inside the bucket
pub const IMAGE_KEY_PREFIX: &str = "images";

#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3ImageStore {
    pub fn new(settings: S3Settings) -> Self {
        debug!("Initializing S3 image store with settings: {:?}", settings);

        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "bookstore-seeder",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(settings.region.clone()))
            .force_path_style(settings.path_style);

        if let Some(endpoint) = &settings.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(bucket = %settings.bucket, region = %settings.region, "S3 image store initialized");

        Self {
            client,
            bucket: settings.bucket,
            region: settings.region,
            endpoint: settings.endpoint,
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    fn object_key(&self, external_id: &str, file_name: &str) -> String {
        format!("{}/{}/{}", IMAGE_KEY_PREFIX, external_id, file_name)
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match e.as_service_error() {
                Some(service_error) if service_error.is_not_found() => Ok(false),
                _ => Err(anyhow!("Failed to check S3 object existence for {}: {}", key, e)),
            },
        }
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", data.len(), self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);

        Ok(())
    }

    fn public_ref(&self, key: &str) -> String {
        public_url(self.endpoint.as_deref(), &self.bucket, &self.region, key)
    }
}

/// Public URL of an object: virtual-hosted AWS style, or
/// `{endpoint}/{bucket}/{key}` for S3-compatible endpoints.
pub fn public_url(endpoint: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::publish_image;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(endpoint: Option<&str>) -> S3Settings {
        S3Settings {
            endpoint: endpoint.map(str::to_string),
            region: "ap-southeast-1".to_string(),
            bucket: "bookstore-images".to_string(),
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            path_style: endpoint.is_some(),
        }
    }

    #[test]
    fn test_object_key_uses_image_prefix() {
        let store = S3ImageStore::new(settings(None));
        assert_eq!(store.object_key("T1", "0.webp"), "images/T1/0.webp");
    }

    #[test]
    fn test_public_ref_aws() {
        let store = S3ImageStore::new(settings(None));
        assert_eq!(
            store.public_ref("images/T1/0.webp"),
            "https://bookstore-images.s3.ap-southeast-1.amazonaws.com/images/T1/0.webp"
        );
    }

    #[tokio::test]
    async fn test_publish_uploads_once_then_reuses() {
        let server = MockServer::start().await;
        let object = "/bookstore-images/images/T1/0.jpg";

        Mock::given(method("HEAD"))
            .and(path(object))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path(object))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(object))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("0.jpg");
        std::fs::write(&file, b"jpg").unwrap();

        let store = S3ImageStore::new(settings(Some(&server.uri())));
        let key = store.object_key("T1", "0.jpg");

        let first = publish_image(&store, &key, &file).await.unwrap();
        let second = publish_image(&store, &key, &file).await.unwrap();

        assert_eq!(first, format!("{}{}", server.uri(), object));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_exists_propagates_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = S3ImageStore::new(settings(Some(&server.uri())));

        assert!(store.exists("images/T1/0.jpg").await.is_err());
    }

    #[test]
    fn test_public_ref_custom_endpoint() {
        let store = S3ImageStore::new(settings(Some("http://localhost:9000/")));
        assert_eq!(
            store.public_ref("images/T1/0.webp"),
            "http://localhost:9000/bookstore-images/images/T1/0.webp"
        );
    }
}
