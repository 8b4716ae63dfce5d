//! Mock provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::provider::{Provider, ProviderError, SearchOptions, SearchResult};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    pub query: String,
    pub options: SearchOptions,
    pub timestamp: Instant,
}

/// Produces results for a query; `None` falls back to the configured results.
type QueryHandler = Box<dyn Fn(&str) -> Option<Vec<SearchResult>> + Send + Sync>;

/// Mock implementation of the Provider trait.
///
/// Returns configured results (or a sticky error), records every call and
/// can simulate latency.
///
/// # Example
///
/// ```rust,ignore
/// use reelcache_core::testing::{fixtures, MockProvider};
///
/// let provider = MockProvider::new("mock");
/// provider.set_results(vec![fixtures::torrent_result("Inception 2010 1080p", "mock", 200)]).await;
///
/// let results = provider.search("inception", &SearchOptions::default()).await?;
/// assert_eq!(results.len(), 1);
/// assert_eq!(provider.search_calls().await.len(), 1);
/// ```
pub struct MockProvider {
    name: String,
    results: Arc<RwLock<Vec<SearchResult>>>,
    /// Returned by every search until cleared or replaced by `set_results`.
    error: Arc<RwLock<Option<ProviderError>>>,
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    query_handler: Arc<RwLock<Option<QueryHandler>>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("results", &"<results>")
            .field("query_handler", &"<handler>")
            .finish()
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Arc::new(RwLock::new(Vec::new())),
            error: Arc::new(RwLock::new(None)),
            searches: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
            query_handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the results for subsequent searches and clear any error.
    pub async fn set_results(&self, results: Vec<SearchResult>) {
        *self.results.write().await = results;
        *self.error.write().await = None;
    }

    /// Fail every subsequent search with `error`.
    pub async fn set_error(&self, error: ProviderError) {
        *self.error.write().await = Some(error);
    }

    pub async fn clear_error(&self) {
        *self.error.write().await = None;
    }

    /// Sleep this long before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<Vec<SearchResult>> + Send + Sync + 'static,
    {
        *self.query_handler.write().await = Some(Box::new(handler));
    }

    /// Searches made so far, oldest first.
    pub async fn search_calls(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.searches.write().await.push(RecordedSearch {
            query: query.to_string(),
            options: options.clone(),
            timestamp: Instant::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.error.read().await.clone() {
            return Err(err);
        }

        if let Some(handler) = self.query_handler.read().await.as_ref() {
            if let Some(results) = handler(query) {
                return Ok(results);
            }
        }

        Ok(self.results.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_records_searches() {
        let provider = MockProvider::new("mock");
        provider
            .set_results(vec![fixtures::torrent_result("Film 1080p", "mock", 10)])
            .await;

        let results = provider
            .search("film", &SearchOptions::episode(2, Some(3)))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let calls = provider.search_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query, "film");
        assert_eq!(calls[0].options.season, Some(2));
    }

    #[tokio::test]
    async fn test_error_is_sticky_until_results_set() {
        let provider = MockProvider::new("mock");
        provider.set_error(ProviderError::Timeout).await;

        assert!(provider.search("a", &SearchOptions::default()).await.is_err());
        assert!(provider.search("a", &SearchOptions::default()).await.is_err());

        provider.set_results(vec![]).await;
        assert!(provider.search("a", &SearchOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_query_handler_overrides_results() {
        let provider = MockProvider::new("mock");
        provider
            .set_query_handler(|q| (q == "special").then(Vec::new))
            .await;
        provider
            .set_results(vec![fixtures::stream_result("Film", "mock")])
            .await;

        let special = provider.search("special", &SearchOptions::default()).await.unwrap();
        let other = provider.search("other", &SearchOptions::default()).await.unwrap();
        assert!(special.is_empty());
        assert_eq!(other.len(), 1);
    }
}
