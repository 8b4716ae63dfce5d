//! Types shared by provider adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which request path a provider serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTier {
    /// Answers the synchronous resolve path.
    #[default]
    Primary,
    /// Higher-latency sources used by background upgrade jobs.
    Fallback,
}

/// How a `fetch_ref` can be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    /// Magnet URI, `.torrent` link, or a media file URL.
    Direct,
    /// A page that needs another resolution step.
    Indirect,
}

const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".avi", ".webm", ".m4v", ".mov"];

/// Classify a fetch reference as direct or indirect.
pub fn classify_fetch_ref(fetch_ref: &str) -> FetchKind {
    let lower = fetch_ref.trim().to_lowercase();
    if lower.starts_with("magnet:") {
        return FetchKind::Direct;
    }
    if lower.contains(".torrent") {
        return FetchKind::Direct;
    }
    let path = lower.split(['?', '#']).next().unwrap_or("");
    if MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return FetchKind::Direct;
    }
    FetchKind::Indirect
}

/// One candidate returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    /// Resolution or rip tag ("1080p", "cam", ...). Empty when unknown.
    #[serde(default)]
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Absent for non-swarm sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    pub provider: String,
    pub fetch_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(default)]
    pub season_pack: bool,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        provider: impl Into<String>,
        fetch_ref: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            year: None,
            quality: String::new(),
            size_bytes: None,
            seeders: None,
            leechers: None,
            provider: provider.into(),
            fetch_ref: fetch_ref.into(),
            poster_url: None,
            season: None,
            episode: None,
            season_pack: false,
        }
    }

    pub fn fetch_kind(&self) -> FetchKind {
        classify_fetch_ref(&self.fetch_ref)
    }

    pub fn is_direct(&self) -> bool {
        self.fetch_kind() == FetchKind::Direct
    }

    /// Seeders as a comparable score; absent counts as -1.
    pub fn seeder_score(&self) -> i64 {
        self.seeders.map(i64::from).unwrap_or(-1)
    }
}

/// Per-call search options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Restrict the call to providers of this tier (all enabled when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<ProviderTier>,
    /// Overrides the aggregator's size ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn tier(tier: ProviderTier) -> Self {
        Self {
            tier: Some(tier),
            ..Default::default()
        }
    }

    pub fn episode(season: u32, episode: Option<u32>) -> Self {
        Self {
            season: Some(season),
            episode,
            ..Default::default()
        }
    }
}

/// Errors a provider adapter can return.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// An upstream content provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name; also keys its circuit breaker.
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, ProviderError>;
}
