// Dataset archive fetcher
//
// Downloads the release zip once (a local copy is reused), unpacks it into
// the work directory and locates the folder holding the CSVs and images.

use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{DatasetConfig, DATASET_ROOT_CANDIDATES};
use crate::error::Result;

/// Generous timeout; the archive carries every cover image
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 900;

pub struct ArchiveFetcher {
    client: Client,
    config: DatasetConfig,
}

impl ArchiveFetcher {
    pub fn new(config: DatasetConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .user_agent(concat!("bookstore-seeder/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    /// Download, extract and return the dataset root
    pub async fn fetch(&self) -> Result<PathBuf> {
        self.ensure_archive().await?;
        extract_zip(&self.config.archive_path, &self.config.work_dir).await?;

        let root = resolve_dataset_root(&self.config.work_dir);
        info!("Dataset root: {}", root.display());

        Ok(root)
    }

    /// Download the archive unless a local copy exists. Returns whether a
    /// download happened.
    pub async fn ensure_archive(&self) -> Result<bool> {
        let path = &self.config.archive_path;

        if tokio::fs::try_exists(path).await? {
            info!("Using existing archive {}", path.display());
            return Ok(false);
        }

        info!("Downloading dataset archive from {}", self.config.archive_url);

        let mut response = self
            .client
            .get(&self.config.archive_url)
            .send()
            .await?
            .error_for_status()?;

        // Stream into a sibling file so an interrupted download is never
        // mistaken for a complete archive on the next run.
        let partial = partial_path(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, path).await?;

        info!(
            "Downloaded archive: {} bytes ({} MB) to {}",
            written,
            written / (1024 * 1024),
            path.display()
        );

        Ok(true)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Extract every entry of a zip archive into `dest`
pub async fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    info!("Extracting {} into {}", archive.display(), dest.display());

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        std::fs::create_dir_all(&dest)?;
        let file = std::fs::File::open(&archive)?;
        let mut zip = zip::ZipArchive::new(file)?;
        debug!("Archive holds {} entries", zip.len());
        zip.extract(&dest)?;
        Ok(())
    })
    .await??;

    Ok(())
}

/// First known dataset folder present under `extracted`, else `extracted` itself
pub fn resolve_dataset_root(extracted: &Path) -> PathBuf {
    DATASET_ROOT_CANDIDATES
        .iter()
        .map(|name| extracted.join(name))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| extracted.to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn dataset_config(dir: &Path, url: String) -> DatasetConfig {
        DatasetConfig {
            archive_url: url,
            archive_path: dir.join("book.zip"),
            work_dir: dir.join("temp_data"),
        }
    }

    #[test]
    fn test_resolve_prefers_data_then_book() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_dataset_root(dir.path()), dir.path());

        std::fs::create_dir(dir.path().join("book")).unwrap();
        assert_eq!(resolve_dataset_root(dir.path()), dir.path().join("book"));

        std::fs::create_dir(dir.path().join("Data")).unwrap();
        assert_eq!(resolve_dataset_root(dir.path()), dir.path().join("Data"));
    }

    #[tokio::test]
    async fn test_extract_zip_writes_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("book.zip");
        std::fs::write(
            &archive,
            zip_bytes(&[
                ("book/tiki_categories.csv", b"id,name\n1,Fiction\n"),
                ("book/images/T1/0.jpg", b"jpg"),
            ]),
        )
        .unwrap();

        let out = dir.path().join("out");
        extract_zip(&archive, &out).await.unwrap();

        assert_eq!(resolve_dataset_root(&out), out.join("book"));
        assert!(out.join("book/images/T1/0.jpg").exists());
    }

    #[tokio::test]
    async fn test_fetch_downloads_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/book.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[(
                "Data/tiki_books_from_leaf.csv",
                b"id,title\nT1,Dune\n",
            )])))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/book.zip", server.uri());
        let fetcher = ArchiveFetcher::new(dataset_config(dir.path(), url)).unwrap();

        let root = fetcher.fetch().await.unwrap();

        assert_eq!(root, dir.path().join("temp_data").join("Data"));
        assert!(root.join("tiki_books_from_leaf.csv").exists());
        assert!(!dir.path().join("book.zip.part").exists());
    }

    #[tokio::test]
    async fn test_existing_archive_is_not_downloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("book.zip"), zip_bytes(&[("a.csv", b"id\n")])).unwrap();

        let url = format!("{}/book.zip", server.uri());
        let fetcher = ArchiveFetcher::new(dataset_config(dir.path(), url)).unwrap();

        assert!(!fetcher.ensure_archive().await.unwrap());
        assert_eq!(fetcher.fetch().await.unwrap(), dir.path().join("temp_data"));
    }

    #[tokio::test]
    async fn test_http_error_fails_and_leaves_no_archive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/book.zip", server.uri());
        let fetcher = ArchiveFetcher::new(dataset_config(dir.path(), url)).unwrap();

        let result = fetcher.ensure_archive().await;

        assert!(matches!(result, Err(crate::error::SeedError::Download(_))));
        assert!(!dir.path().join("book.zip").exists());
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = "http://127.0.0.1:1/book.zip".to_string();
        let fetcher = ArchiveFetcher::new(dataset_config(dir.path(), url)).unwrap();

        assert!(fetcher.fetch().await.is_err());
    }
}
