//! Testing utilities and mock implementations of the collaborator traits,
//! allowing resolution scenarios to run without indexers or disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelcache_core::testing::{fixtures, MockDelivery, MockFetcher, MockProvider};
//!
//! let provider = MockProvider::new("mock");
//! provider.set_results(vec![fixtures::torrent_result("Inception 2010 1080p", "mock", 200)]).await;
//!
//! // Wire into an Aggregator / Resolver...
//! ```

mod mock_delivery;
mod mock_fetcher;
mod mock_provider;

pub use mock_delivery::MockDelivery;
pub use mock_fetcher::MockFetcher;
pub use mock_provider::{MockProvider, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::provider::release::{parse_episode_span, parse_quality, parse_year, EpisodeSpan};
    use crate::provider::SearchResult;

    /// A torrent result with a magnet link; year, quality and episode are
    /// parsed from `title`.
    pub fn torrent_result(title: &str, provider: &str, seeders: u32) -> SearchResult {
        let hash: String = title
            .bytes()
            .map(|b| format!("{:02x}", b))
            .collect::<String>()
            .chars()
            .take(40)
            .collect();
        let mut result = SearchResult::new(
            title,
            provider,
            format!("magnet:?xt=urn:btih:{}&dn={}", hash, urlencoding::encode(title)),
        );
        result.year = parse_year(title);
        result.quality = parse_quality(title);
        result.size_bytes = Some(1024 * 1024 * 1536); // 1.5 GB
        result.seeders = Some(seeders);
        result.leechers = Some(seeders / 4);
        if let Some(EpisodeSpan::Single { season, episode }) = parse_episode_span(title, None) {
            result.season = Some(season);
            result.episode = Some(episode);
        }
        result
    }

    /// A streaming-page result: indirect fetch path, no swarm metrics.
    pub fn stream_result(title: &str, provider: &str) -> SearchResult {
        let slug = title.to_lowercase().replace(' ', "-");
        let mut result = SearchResult::new(
            title,
            provider,
            format!("https://stream.example/watch/{}", slug),
        );
        result.year = parse_year(title);
        result.quality = parse_quality(title);
        result
    }
}
