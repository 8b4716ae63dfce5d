use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::cache::{cache_key, episode_key, CacheEntry, ContentCache};
use crate::config::ResolverConfig;
use crate::delivery::DeliveryChannel;
use crate::fetcher::MediaFetcher;
use crate::metrics;
use crate::provider::release::meets_quality_floor;
use crate::provider::{ProviderTier, SearchOptions, SearchResult};
use crate::queue::{EnqueueOutcome, Job, JobFactory, JobQueue, JobRecord};

use super::types::{
    EpisodeOutcome, ResolveError, ResolveOutcome, ResolveStatus, SeasonOutcome, SeasonRequest,
};
use super::upgrade::{cache_entry, fetch_and_upload, source_type_of, UpgradeJob, UpgradeRequest};

/// Orchestrates cache, aggregation, fetch, delivery and the upgrade queue.
#[derive(Clone)]
pub struct Resolver {
    config: ResolverConfig,
    cache: Arc<ContentCache>,
    aggregator: Arc<Aggregator>,
    queue: JobQueue,
    fetcher: Arc<dyn MediaFetcher>,
    delivery: Arc<dyn DeliveryChannel>,
}

/// Where a selection is delivered and keyed.
struct Slot<'a> {
    key: &'a str,
    title: &'a str,
    target: Option<&'a str>,
    season: Option<u32>,
    episode: Option<u32>,
}

impl Resolver {
    pub fn new(
        config: ResolverConfig,
        cache: Arc<ContentCache>,
        aggregator: Arc<Aggregator>,
        queue: JobQueue,
        fetcher: Arc<dyn MediaFetcher>,
        delivery: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            config,
            cache,
            aggregator,
            queue,
            fetcher,
            delivery,
        }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Resolve `title` and deliver it to `target` when one is given.
    pub async fn resolve(
        &self,
        title: &str,
        target: Option<&str>,
    ) -> Result<ResolveOutcome, ResolveError> {
        let key = cache_key(title);
        let outcome = self.resolve_inner(title.trim(), &key, target).await?;
        metrics::RESOLUTIONS
            .with_label_values(&[outcome.status.as_str()])
            .inc();
        info!(
            key = %outcome.key,
            status = outcome.status.as_str(),
            job_queued = outcome.job_queued,
            "Resolution finished"
        );
        Ok(outcome)
    }

    async fn resolve_inner(
        &self,
        title: &str,
        key: &str,
        target: Option<&str>,
    ) -> Result<ResolveOutcome, ResolveError> {
        if key.is_empty() {
            return Ok(ResolveOutcome::new(key, ResolveStatus::NotFound, "Empty title"));
        }
        if self.cache.is_active(key) {
            return Ok(in_progress(key));
        }
        if let Some(outcome) = self.serve_cached(key, target).await? {
            return Ok(outcome);
        }

        let Some(_guard) = self.cache.mark_active(key) else {
            return Ok(in_progress(key));
        };
        // Another resolution may have finished between the check and the mark.
        if let Some(outcome) = self.serve_cached(key, target).await? {
            return Ok(outcome);
        }

        let options = SearchOptions {
            tier: self.sync_tier(),
            ..Default::default()
        };
        let candidates = self.aggregator.search(title, &options).await;
        if candidates.is_empty() {
            return Ok(ResolveOutcome::new(
                key,
                ResolveStatus::NotFound,
                format!("No results for '{}'", title),
            ));
        }

        let slot = Slot {
            key,
            title,
            target,
            season: None,
            episode: None,
        };
        self.select(&slot, &candidates).await
    }

    /// Resolve several episodes of one season with a single aggregation.
    pub async fn resolve_season(
        &self,
        request: &SeasonRequest,
        target: Option<&str>,
    ) -> Result<SeasonOutcome, ResolveError> {
        let title = request.title.trim();
        let season = request.season;
        let episodes: BTreeSet<u32> = request.episodes.iter().copied().collect();

        let mut outcomes: Vec<EpisodeOutcome> = Vec::with_capacity(episodes.len());
        // Episodes this call resolves; each key stays claimed until its
        // selection is done.
        let mut pending = Vec::new();
        for &episode in &episodes {
            let key = episode_key(title, season, episode);
            if self.cache.is_active(&key) {
                outcomes.push(EpisodeOutcome {
                    episode,
                    outcome: in_progress(&key),
                });
                continue;
            }
            if let Some(outcome) = self.serve_cached(&key, target).await? {
                outcomes.push(EpisodeOutcome { episode, outcome });
                continue;
            }

            let Some(guard) = self.cache.mark_active(&key) else {
                outcomes.push(EpisodeOutcome {
                    episode,
                    outcome: in_progress(&key),
                });
                continue;
            };
            if let Some(outcome) = self.serve_cached(&key, target).await? {
                outcomes.push(EpisodeOutcome { episode, outcome });
                continue;
            }
            pending.push((episode, key, guard));
        }

        let mut candidates = Vec::new();
        if !pending.is_empty() && !title.is_empty() {
            let options = SearchOptions {
                tier: self.sync_tier(),
                ..SearchOptions::episode(season, None)
            };
            let query = format!("{} S{:02}", title, season);
            candidates = self.aggregator.search(&query, &options).await;
        }

        for (episode, key, _guard) in pending {
            let outcome = self
                .resolve_episode(title, season, episode, &key, target, &candidates)
                .await?;
            outcomes.push(EpisodeOutcome { episode, outcome });
        }
        outcomes.sort_by_key(|o| o.episode);

        for o in &outcomes {
            metrics::RESOLUTIONS
                .with_label_values(&[o.outcome.status.as_str()])
                .inc();
        }

        let unresolved: Vec<u32> = outcomes
            .iter()
            .filter(|o| !o.outcome.status.is_resolved())
            .map(|o| o.episode)
            .collect();
        let season_pack = if unresolved.is_empty() {
            None
        } else {
            candidates
                .iter()
                .find(|r| r.season_pack && r.season == Some(season))
                .cloned()
        };

        info!(
            title = title,
            season = season,
            episodes = outcomes.len(),
            unresolved = unresolved.len(),
            pack_offered = season_pack.is_some(),
            "Season resolution finished"
        );

        Ok(SeasonOutcome {
            title: title.to_string(),
            season,
            episodes: outcomes,
            unresolved,
            season_pack,
        })
    }

    /// Select for one episode whose key the caller has claimed.
    async fn resolve_episode(
        &self,
        title: &str,
        season: u32,
        episode: u32,
        key: &str,
        target: Option<&str>,
        candidates: &[SearchResult],
    ) -> Result<ResolveOutcome, ResolveError> {
        if candidates.is_empty() {
            return Ok(ResolveOutcome::new(
                key,
                ResolveStatus::NotFound,
                format!("No results for '{} S{:02}'", title, season),
            ));
        }

        let slot = Slot {
            key,
            title,
            target,
            season: Some(season),
            episode: Some(episode),
        };
        let floor = self.config.min_episode_quality;
        let eligible: Vec<SearchResult> = candidates
            .iter()
            .filter(|r| r.episode == Some(episode) && !r.season_pack)
            .filter(|r| meets_quality_floor(&r.quality, floor))
            .cloned()
            .collect();

        if eligible.is_empty() {
            debug!(key = key, floor = floor, "No episode candidate at quality floor");
            let mut outcome = ResolveOutcome::new(
                key,
                ResolveStatus::Queued,
                format!("No candidate at {}p or better; searching in background", floor),
            );
            outcome.job_queued = self.enqueue_upgrade(&slot)?;
            return Ok(outcome);
        }

        self.select(&slot, &eligible).await
    }

    /// Pick between an immediate delivery and a degraded delivery plus upgrade.
    async fn select(
        &self,
        slot: &Slot<'_>,
        candidates: &[SearchResult],
    ) -> Result<ResolveOutcome, ResolveError> {
        let min_seeders = self.config.min_seeders;
        let healthy = candidates
            .iter()
            .filter(|r| r.is_direct())
            .find(|r| r.seeders.is_some_and(|s| s >= min_seeders));

        if let Some(best) = healthy {
            return match self.deliver_now(slot, best).await {
                Ok(mut outcome) => {
                    outcome.selected = Some(best.clone());
                    Ok(outcome)
                }
                Err(e) => {
                    warn!(key = slot.key, error = %e, "Immediate fetch failed, queueing upgrade");
                    let mut outcome = ResolveOutcome::new(
                        slot.key,
                        ResolveStatus::Queued,
                        format!("Fetch failed ({}); retrying in background", e),
                    );
                    outcome.selected = Some(best.clone());
                    outcome.job_queued = self.enqueue_upgrade(slot)?;
                    Ok(outcome)
                }
            };
        }

        // candidates is non-empty here; callers check.
        let Some(fallback) = candidates.first() else {
            return Ok(ResolveOutcome::new(
                slot.key,
                ResolveStatus::NotFound,
                "No candidates",
            ));
        };

        let mut outcome = ResolveOutcome::new(
            slot.key,
            ResolveStatus::Queued,
            "Delivered best available copy; a better one is being searched",
        );
        outcome.warning = Some(format!(
            "Low availability: {} seeders (wanted {}). Quality may be poor.",
            fallback.seeders.map_or("no".to_string(), |s| s.to_string()),
            min_seeders
        ));
        match self.deliver_now(slot, fallback).await {
            Ok(delivered) => {
                outcome.file_ref = delivered.file_ref;
                outcome.source_type = delivered.source_type;
            }
            Err(e) => {
                debug!(key = slot.key, error = %e, "Degraded delivery failed");
                outcome.detail = "Searching for a copy in background".to_string();
            }
        }
        outcome.selected = Some(fallback.clone());
        outcome.job_queued = self.enqueue_upgrade(slot)?;
        Ok(outcome)
    }

    /// Fetch, upload and deliver `result`, then cache it. Nothing is cached
    /// when the delivery fails.
    async fn deliver_now(
        &self,
        slot: &Slot<'_>,
        result: &SearchResult,
    ) -> Result<ResolveOutcome, crate::queue::JobError> {
        let (artifact, receipt) =
            fetch_and_upload(self.fetcher.as_ref(), self.delivery.as_ref(), slot.key, result)
                .await?;

        if let Some(target) = slot.target {
            self.delivery.deliver(target, &receipt.file_ref).await?;
        }

        let entry = cache_entry(result, &artifact, &receipt, self.delivery.channel_id());
        self.cache.add(slot.key, entry)?;

        let mut outcome = ResolveOutcome::new(
            slot.key,
            ResolveStatus::Delivered,
            format!("Delivered '{}' from {}", result.title, result.provider),
        );
        outcome.file_ref = Some(receipt.file_ref);
        outcome.source_type = Some(source_type_of(result, &artifact));
        Ok(outcome)
    }

    /// Deliver a live cache entry. A failed delivery drops the entry so the
    /// caller falls through to a fresh resolution.
    async fn serve_cached(
        &self,
        key: &str,
        target: Option<&str>,
    ) -> Result<Option<ResolveOutcome>, ResolveError> {
        let Some(entry) = self.cache.check(key)? else {
            return Ok(None);
        };

        if let Some(target) = target {
            if let Err(e) = self.delivery.deliver(target, &entry.file_ref).await {
                warn!(key = key, file_ref = %entry.file_ref, error = %e, "Cached file no longer deliverable");
                self.cache.remove(key)?;
                return Ok(None);
            }
        }

        Ok(Some(hit(key, entry)))
    }

    /// Returns whether a new job was scheduled; false when one was already
    /// queued for the key.
    fn enqueue_upgrade(&self, slot: &Slot<'_>) -> Result<bool, ResolveError> {
        let request = UpgradeRequest {
            key: slot.key.to_string(),
            title: slot.title.to_string(),
            target: slot.target.map(str::to_string),
            season: slot.season,
            episode: slot.episode,
            min_quality: slot.episode.map(|_| self.config.min_episode_quality),
        };
        let outcome = self.queue.enqueue(slot.key, self.upgrade_job(request))?;
        debug!(key = slot.key, outcome = ?outcome, "Upgrade job enqueued");
        Ok(outcome == EnqueueOutcome::Scheduled)
    }

    fn upgrade_job(&self, request: UpgradeRequest) -> Arc<dyn Job> {
        Arc::new(UpgradeJob::new(
            request,
            self.aggregator.clone(),
            self.fetcher.clone(),
            self.delivery.clone(),
            self.cache.clone(),
        ))
    }

    /// Rebuilds upgrade jobs from persisted payloads for `JobQueue::resume_pending`.
    pub fn job_factory(&self) -> JobFactory {
        let resolver = self.clone();
        Arc::new(move |key: &str, record: &JobRecord| {
            let request: UpgradeRequest = match record.payload.clone() {
                Some(value) => serde_json::from_value(value).ok()?,
                None => UpgradeRequest {
                    key: key.to_string(),
                    title: key.to_string(),
                    target: None,
                    season: None,
                    episode: None,
                    min_quality: None,
                },
            };
            Some(resolver.upgrade_job(request))
        })
    }

    fn sync_tier(&self) -> Option<ProviderTier> {
        self.aggregator
            .registry()
            .has_tier(ProviderTier::Primary)
            .then_some(ProviderTier::Primary)
    }
}

fn in_progress(key: &str) -> ResolveOutcome {
    ResolveOutcome::new(key, ResolveStatus::InProgress, "Already being resolved")
}

fn hit(key: &str, entry: CacheEntry) -> ResolveOutcome {
    let mut outcome = ResolveOutcome::new(key, ResolveStatus::Hit, "Served from cache");
    outcome.file_ref = Some(entry.file_ref);
    outcome.source_type = Some(entry.source_type);
    outcome
}
