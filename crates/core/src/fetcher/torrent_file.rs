//! Fetcher that materializes torrent descriptors and direct downloads.

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::{FetchError, FetchedArtifact, MediaFetcher};
use crate::config::FetcherConfig;
use crate::provider::{FetchKind, SearchResult};

/// Writes magnet links to `.magnet` files and downloads direct HTTP links
/// (`.torrent` descriptors or media files) into a work directory.
pub struct TorrentFileFetcher {
    client: Client,
    work_dir: PathBuf,
}

impl TorrentFileFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Download(format!("HTTP client: {}", e)))?;

        let work_dir = config
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("reelcache"));

        Ok(Self { client, work_dir })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Unique file name derived from the release title.
    fn artifact_path(&self, title: &str, extension: &str) -> PathBuf {
        let stem: String = title
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .take(80)
            .collect();
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.work_dir
            .join(format!("{}-{}.{}", stem, &id[..8], extension))
    }

    async fn write_magnet(&self, result: &SearchResult) -> Result<FetchedArtifact, FetchError> {
        let path = self.artifact_path(&result.title, "magnet");
        fs::write(&path, result.fetch_ref.as_bytes()).await?;
        debug!(path = %path.display(), "Wrote magnet descriptor");

        Ok(FetchedArtifact {
            file_size_bytes: result.fetch_ref.len() as u64,
            local_path: path,
            source_url: result.fetch_ref.clone(),
            descriptor_only: true,
        })
    }

    async fn download(&self, result: &SearchResult) -> Result<FetchedArtifact, FetchError> {
        let url = &result.fetch_ref;
        let descriptor_only = url.to_lowercase().contains(".torrent");
        let extension = if descriptor_only {
            "torrent".to_string()
        } else {
            media_extension(url).unwrap_or_else(|| "bin".to_string())
        };

        let mut response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Download(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchError::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let path = self.artifact_path(&result.title, &extension);
        let mut writer = BufWriter::new(File::create(&path).await?);
        let mut total = 0u64;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    drop(writer);
                    let _ = fs::remove_file(&path).await;
                    return Err(if e.is_timeout() {
                        FetchError::Timeout
                    } else {
                        FetchError::Download(e.to_string())
                    });
                }
            };
            writer.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        writer.flush().await?;

        info!(url = %url, bytes = total, path = %path.display(), "Downloaded artifact");

        Ok(FetchedArtifact {
            local_path: path,
            file_size_bytes: total,
            source_url: url.clone(),
            descriptor_only,
        })
    }
}

fn media_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let ext = Path::new(path).extension()?.to_str()?;
    Some(ext.to_lowercase())
}

#[async_trait]
impl MediaFetcher for TorrentFileFetcher {
    async fn fetch(&self, result: &SearchResult) -> Result<FetchedArtifact, FetchError> {
        if result.fetch_kind() == FetchKind::Indirect {
            return Err(FetchError::Unsupported(result.fetch_ref.clone()));
        }

        fs::create_dir_all(&self.work_dir).await?;

        if result.fetch_ref.trim().to_lowercase().starts_with("magnet:") {
            self.write_magnet(result).await
        } else if result.fetch_ref.starts_with("http://") || result.fetch_ref.starts_with("https://")
        {
            self.download(result).await
        } else {
            Err(FetchError::Unsupported(result.fetch_ref.clone()))
        }
    }
}
