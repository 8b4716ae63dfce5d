//! Concurrent provider fan-out with dedup, size filtering and ranking.
//!
//! `Aggregator::search` never fails: provider errors are logged, fed to the
//! provider's circuit breaker and contribute nothing to the result.

mod dedup;
mod episodes;
mod ranking;

pub use dedup::{deduplicate, DedupKey};
pub use episodes::expand_episodes;
pub use ranking::{filter_by_size, rank};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::breaker::BreakerRegistry;
use crate::config::AggregatorConfig;
use crate::metrics;
use crate::provider::{ProviderEntry, ProviderRegistry, SearchOptions, SearchResult};

/// What happened to one provider during a fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Ok { results: usize },
    Failed { error: String },
    /// Breaker open; provider not called.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderReport {
    pub provider: String,
    #[serde(flatten)]
    pub outcome: ProviderOutcome,
}

/// Ranked results plus per-provider outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub results: Vec<SearchResult>,
    pub providers: Vec<ProviderReport>,
    pub duration_ms: u64,
}

pub struct Aggregator {
    registry: Arc<ProviderRegistry>,
    breakers: Arc<BreakerRegistry>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        breakers: Arc<BreakerRegistry>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            registry,
            breakers,
            config,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Ranked, deduplicated results for `query`.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        self.search_with_report(query, options).await.results
    }

    pub async fn search_with_report(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> AggregateReport {
        let start = Instant::now();
        let entries = self.registry.enabled(options.tier);

        let mut reports = Vec::with_capacity(entries.len());
        let mut eligible: Vec<(usize, ProviderEntry)> = Vec::new();
        for (i, entry) in entries.into_iter().enumerate() {
            if self.breakers.get(entry.name()).can_request() {
                eligible.push((i, entry));
            } else {
                debug!(provider = %entry.name(), "Skipping provider, circuit open");
                metrics::PROVIDER_CALLS
                    .with_label_values(&[entry.name(), "skipped"])
                    .inc();
                reports.push((
                    i,
                    ProviderReport {
                        provider: entry.name().to_string(),
                        outcome: ProviderOutcome::Skipped,
                    },
                ));
            }
        }

        let concurrency = self.config.max_concurrent_providers.max(1);
        let mut calls: Vec<_> = stream::iter(eligible)
            .map(|(i, entry)| async move {
                let result = entry.adapter.search(query, options).await;
                (i, entry, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // Completion order is arbitrary; merge in registration order.
        calls.sort_by_key(|(i, _, _)| *i);

        let mut merged = Vec::new();
        for (i, entry, result) in calls {
            let name = entry.name().to_string();
            let breaker = self.breakers.get(&name);
            let outcome = match result {
                Ok(results) => {
                    if results.is_empty() {
                        metrics::PROVIDER_CALLS
                            .with_label_values(&[&name, "empty"])
                            .inc();
                    } else {
                        breaker.on_success();
                        metrics::PROVIDER_CALLS
                            .with_label_values(&[&name, "success"])
                            .inc();
                    }
                    let count = results.len();
                    merged.extend(results);
                    ProviderOutcome::Ok { results: count }
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider search failed");
                    breaker.on_failure();
                    metrics::PROVIDER_CALLS
                        .with_label_values(&[&name, "error"])
                        .inc();
                    ProviderOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            reports.push((
                i,
                ProviderReport {
                    provider: name,
                    outcome,
                },
            ));
        }
        reports.sort_by_key(|(i, _)| *i);

        let raw_count = merged.len();
        if options.season.is_some() {
            merged = expand_episodes(merged, options.season);
        }
        let deduped = deduplicate(merged);
        let max_size = options.max_size_bytes.unwrap_or(self.config.max_size_bytes);
        let mut results = filter_by_size(deduped, max_size);
        rank(&mut results, |name| self.registry.priority_of(name));
        if let Some(limit) = options.limit {
            results.truncate(limit);
        }

        let elapsed = start.elapsed();
        metrics::AGGREGATION_DURATION.observe(elapsed.as_secs_f64());

        info!(
            query = query,
            providers = reports.len(),
            raw = raw_count,
            results = results.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Aggregation complete"
        );

        AggregateReport {
            results,
            providers: reports.into_iter().map(|(_, r)| r).collect(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}
