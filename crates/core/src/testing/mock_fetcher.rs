//! Mock media fetcher for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::fetcher::{FetchError, FetchedArtifact, MediaFetcher};
use crate::provider::SearchResult;

/// Returns an artifact for every result without touching the network.
///
/// Artifacts point at paths that do not exist; the resolver tolerates the
/// failed cleanup. Queued failures are returned first, one per fetch.
pub struct MockFetcher {
    fetched: Arc<RwLock<Vec<String>>>,
    failures: Arc<RwLock<VecDeque<FetchError>>>,
    file_size_bytes: u64,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            fetched: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(VecDeque::new())),
            file_size_bytes: 1024 * 1024 * 700,
        }
    }

    /// Fail the next fetch with `error`.
    pub async fn fail_next(&self, error: FetchError) {
        self.failures.write().await.push_back(error);
    }

    /// `fetch_ref`s of successful fetches.
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.read().await.clone()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, result: &SearchResult) -> Result<FetchedArtifact, FetchError> {
        if let Some(err) = self.failures.write().await.pop_front() {
            return Err(err);
        }
        if !result.is_direct() {
            return Err(FetchError::Unsupported(result.fetch_ref.clone()));
        }

        self.fetched.write().await.push(result.fetch_ref.clone());
        Ok(FetchedArtifact {
            local_path: PathBuf::from(format!("/nonexistent/mock/{}", uuid::Uuid::new_v4())),
            file_size_bytes: self.file_size_bytes,
            source_url: result.fetch_ref.clone(),
            descriptor_only: false,
        })
    }
}
