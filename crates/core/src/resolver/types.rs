//! Types for the resolution orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::SourceType;
use crate::provider::SearchResult;
use crate::queue::QueueError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
    /// Served from the cache.
    Hit,
    /// Fetched, uploaded and delivered now.
    Delivered,
    /// A background job will deliver (possibly after a degraded delivery).
    Queued,
    NotFound,
    /// Another resolution for the key is running.
    InProgress,
}

impl ResolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveStatus::Hit => "hit",
            ResolveStatus::Delivered => "delivered",
            ResolveStatus::Queued => "queued",
            ResolveStatus::NotFound => "not_found",
            ResolveStatus::InProgress => "in_progress",
        }
    }

    /// Hit or delivered.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolveStatus::Hit | ResolveStatus::Delivered)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveOutcome {
    pub key: String,
    pub status: ResolveStatus,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    /// Degraded-quality warning for the requester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<SearchResult>,
    pub job_queued: bool,
}

impl ResolveOutcome {
    pub(crate) fn new(key: &str, status: ResolveStatus, detail: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            status,
            detail: detail.into(),
            file_ref: None,
            source_type: None,
            warning: None,
            selected: None,
            job_queued: false,
        }
    }
}

/// Episodes of one season to resolve together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonRequest {
    pub title: String,
    pub season: u32,
    pub episodes: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub episode: u32,
    #[serde(flatten)]
    pub outcome: ResolveOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonOutcome {
    pub title: String,
    pub season: u32,
    pub episodes: Vec<EpisodeOutcome>,
    /// Episodes not hit or delivered now.
    pub unresolved: Vec<u32>,
    /// Complete-season release offered when some episode is unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_pack: Option<SearchResult>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("job queue error: {0}")]
    Queue(#[from] QueueError),
}
