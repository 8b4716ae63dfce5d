//! Background upgrade job: re-resolve against the fallback tier, cache the
//! result and notify the requester.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::cache::{CacheEntry, ContentCache, SourceType};
use crate::delivery::{DeliveryChannel, UploadMetadata, UploadReceipt};
use crate::fetcher::{FetchedArtifact, MediaFetcher};
use crate::provider::release::meets_quality_floor;
use crate::provider::{ProviderTier, SearchOptions, SearchResult};
use crate::queue::{Job, JobError};

/// What an upgrade job needs; persisted as the job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Lowest acceptable vertical resolution (e.g. 720); candidates below
    /// it are never fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quality: Option<u32>,
}

impl UpgradeRequest {
    /// Provider query text (`"Title S01E05"` for episodes).
    pub fn query(&self) -> String {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => format!("{} S{:02}E{:02}", self.title.trim(), s, e),
            (Some(s), None) => format!("{} S{:02}", self.title.trim(), s),
            _ => self.title.trim().to_string(),
        }
    }
}

pub struct UpgradeJob {
    request: UpgradeRequest,
    aggregator: Arc<Aggregator>,
    fetcher: Arc<dyn MediaFetcher>,
    delivery: Arc<dyn DeliveryChannel>,
    cache: Arc<ContentCache>,
}

impl UpgradeJob {
    pub fn new(
        request: UpgradeRequest,
        aggregator: Arc<Aggregator>,
        fetcher: Arc<dyn MediaFetcher>,
        delivery: Arc<dyn DeliveryChannel>,
        cache: Arc<ContentCache>,
    ) -> Self {
        Self {
            request,
            aggregator,
            fetcher,
            delivery,
            cache,
        }
    }

    pub fn request(&self) -> &UpgradeRequest {
        &self.request
    }
}

#[async_trait]
impl Job for UpgradeJob {
    async fn run(&self) -> Result<(), JobError> {
        let req = &self.request;
        let tier = self
            .aggregator
            .registry()
            .has_tier(ProviderTier::Fallback)
            .then_some(ProviderTier::Fallback);
        let options = SearchOptions {
            season: req.season,
            episode: req.episode,
            tier,
            ..Default::default()
        };

        let query = req.query();
        let results = self.aggregator.search(&query, &options).await;
        let best = results
            .into_iter()
            .filter(|r| match req.episode {
                Some(ep) => r.episode == Some(ep) && !r.season_pack,
                None => true,
            })
            .find(|r| {
                req.min_quality
                    .is_none_or(|floor| meets_quality_floor(&r.quality, floor))
            })
            .ok_or_else(|| JobError::NoCandidate(query.clone()))?;

        debug!(key = %req.key, provider = %best.provider, "Upgrade candidate selected");

        let (artifact, receipt) =
            fetch_and_upload(self.fetcher.as_ref(), self.delivery.as_ref(), &req.key, &best)
                .await?;
        let entry = cache_entry(&best, &artifact, &receipt, self.delivery.channel_id());
        self.cache.add(&req.key, entry)?;

        info!(key = %req.key, file_ref = %receipt.file_ref, "Upgrade cached");

        if let Some(target) = &req.target {
            if let Err(e) = self.delivery.deliver(target, &receipt.file_ref).await {
                warn!(key = %req.key, target = %target, error = %e, "Upgrade delivery failed");
            }
            let text = format!("Upgraded copy of '{}' is ready.", query);
            if let Err(e) = self.delivery.notify(target, &text).await {
                warn!(key = %req.key, target = %target, error = %e, "Upgrade notification failed");
            }
        }

        Ok(())
    }

    fn payload(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.request).ok()
    }
}

/// Fetch `result`, upload the artifact and remove the local copy.
pub(crate) async fn fetch_and_upload(
    fetcher: &dyn MediaFetcher,
    delivery: &dyn DeliveryChannel,
    key: &str,
    result: &SearchResult,
) -> Result<(FetchedArtifact, UploadReceipt), JobError> {
    let artifact = fetcher.fetch(result).await?;
    let metadata = UploadMetadata {
        key: key.to_string(),
        caption: result.title.clone(),
        source_url: artifact.source_url.clone(),
    };
    let uploaded = delivery.upload(&artifact.local_path, &metadata).await;

    if let Err(e) = tokio::fs::remove_file(&artifact.local_path).await {
        debug!(path = %artifact.local_path.display(), error = %e, "Could not remove fetched artifact");
    }

    Ok((artifact, uploaded?))
}

pub(crate) fn source_type_of(result: &SearchResult, artifact: &FetchedArtifact) -> SourceType {
    if artifact.descriptor_only {
        SourceType::TorrentFile
    } else if result.seeders.is_some() {
        SourceType::Torrent
    } else {
        SourceType::Streaming
    }
}

pub(crate) fn cache_entry(
    result: &SearchResult,
    artifact: &FetchedArtifact,
    receipt: &UploadReceipt,
    channel_id: Option<String>,
) -> CacheEntry {
    let mut entry = CacheEntry::new(receipt.file_ref.clone(), source_type_of(result, artifact));
    entry.message_ref = receipt.message_ref.clone();
    entry.source_url = Some(artifact.source_url.clone());
    entry.file_size_bytes = Some(artifact.file_size_bytes);
    entry.channel_id = channel_id;
    entry
}
