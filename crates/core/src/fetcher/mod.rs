//! Media fetching: turning a chosen `SearchResult` into a local artifact.

mod torrent_file;

pub use torrent_file::TorrentFileFetcher;

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::provider::SearchResult;

/// A fetched, locally available artifact.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedArtifact {
    pub local_path: PathBuf,
    pub file_size_bytes: u64,
    pub source_url: String,
    /// True when only a torrent descriptor (not the media) was fetched.
    pub descriptor_only: bool,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch reference not supported: {0}")]
    Unsupported(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Fetch timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Materializes a search result on local disk.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, result: &SearchResult) -> Result<FetchedArtifact, FetchError>;
}
