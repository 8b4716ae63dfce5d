//! End-to-end resolution scenarios against mock collaborators and on-disk
//! indices.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use reelcache_core::{
    config::{AggregatorConfig, BreakerConfig, CacheConfig, QueueConfig, ResolverConfig},
    provider::ProviderSettings,
    testing::{fixtures, MockDelivery, MockFetcher, MockProvider},
    Aggregator, BreakerRegistry, CacheEntry, ContentCache, JobQueue, JobRecord, JobStatus,
    JsonFileStore, ProviderRegistry, ProviderTier, ResolveStatus, Resolver, SeasonRequest,
    SourceType,
};

struct TestHarness {
    resolver: Resolver,
    primary: Arc<MockProvider>,
    fallback: Arc<MockProvider>,
    fetcher: Arc<MockFetcher>,
    delivery: Arc<MockDelivery>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache_store = JsonFileStore::<CacheEntry>::open(temp_dir.path().join("index.json"))
            .expect("Failed to open cache index");
        let job_store = JsonFileStore::<JobRecord>::open(temp_dir.path().join("jobs.json"))
            .expect("Failed to open job index");

        let primary = Arc::new(MockProvider::new("primary"));
        let fallback = Arc::new(MockProvider::new("fallback"));
        let registry = ProviderRegistry::new()
            .with(primary.clone(), ProviderSettings::default())
            .and_then(|r| {
                r.with(
                    fallback.clone(),
                    ProviderSettings {
                        tier: ProviderTier::Fallback,
                        ..Default::default()
                    },
                )
            })
            .expect("Failed to build registry");

        let aggregator = Arc::new(Aggregator::new(
            Arc::new(registry),
            Arc::new(BreakerRegistry::new(BreakerConfig::default())),
            AggregatorConfig::default(),
        ));
        let cache = Arc::new(ContentCache::new(Arc::new(cache_store), &CacheConfig::default()));
        let queue = JobQueue::new(Arc::new(job_store), QueueConfig::default());
        let fetcher = Arc::new(MockFetcher::new());
        let delivery = Arc::new(MockDelivery::new());

        let resolver = Resolver::new(
            ResolverConfig::default(),
            cache,
            aggregator,
            queue,
            fetcher.clone(),
            delivery.clone(),
        );

        Self {
            resolver,
            primary,
            fallback,
            fetcher,
            delivery,
            _temp_dir: temp_dir,
        }
    }
}

#[tokio::test]
async fn test_well_seeded_movie_is_delivered_immediately() {
    let h = TestHarness::new();
    h.primary
        .set_results(vec![fixtures::torrent_result(
            "Inception 2010 1080p BluRay",
            "primary",
            200,
        )])
        .await;

    let outcome = h.resolver.resolve("Inception", Some("alice")).await.unwrap();

    assert_eq!(outcome.status, ResolveStatus::Delivered);
    assert!(!outcome.job_queued);
    let entry = h.resolver.cache().peek("inception").unwrap().unwrap();
    assert_eq!(entry.source_type, SourceType::Torrent);
    assert_eq!(entry.channel_id.as_deref(), Some("mock-channel"));
    assert!(h.resolver.queue().list().unwrap().is_empty());
    assert!(h.fallback.search_calls().await.is_empty());
    assert_eq!(h.delivery.deliveries().await.len(), 1);
}

#[tokio::test]
async fn test_poorly_seeded_movie_degrades_and_upgrades_from_fallback() {
    let h = TestHarness::new();
    h.primary
        .set_results(vec![fixtures::torrent_result(
            "Obscure Film 1958 720p",
            "primary",
            3,
        )])
        .await;
    h.fallback
        .set_results(vec![fixtures::torrent_result(
            "Obscure Film 1958 1080p Remux",
            "fallback",
            2,
        )])
        .await;

    let outcome = h
        .resolver
        .resolve("Obscure Film 1958", Some("bob"))
        .await
        .unwrap();

    assert_eq!(outcome.status, ResolveStatus::Queued);
    assert!(outcome.job_queued);
    assert!(outcome.warning.is_some());

    h.resolver.queue().wait_idle().await;

    let jobs = h.resolver.queue().list().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].0, "obscure film 1958");
    assert_eq!(jobs[0].1.status, JobStatus::Completed);

    let fallback_calls = h.fallback.search_calls().await;
    assert_eq!(fallback_calls.len(), 1);
    assert_eq!(fallback_calls[0].options.tier, Some(ProviderTier::Fallback));

    let entry = h.resolver.cache().peek("obscure film 1958").unwrap().unwrap();
    assert!(entry.source_url.unwrap().contains("Remux"));
    let notes = h.delivery.notifications().await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].0, "bob");
    // Degraded copy, then the upgrade.
    assert_eq!(h.delivery.deliveries().await.len(), 2);
}

#[tokio::test]
async fn test_unknown_title_is_not_found() {
    let h = TestHarness::new();

    let outcome = h.resolver.resolve("Zzzznonexistent", None).await.unwrap();

    assert_eq!(outcome.status, ResolveStatus::NotFound);
    assert!(!outcome.job_queued);
    assert!(h.resolver.queue().list().unwrap().is_empty());
    assert!(h.fetcher.fetched().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_resolve_once() {
    let h = TestHarness::new();
    h.primary
        .set_results(vec![fixtures::torrent_result("Heat 1995 1080p", "primary", 90)])
        .await;
    h.primary.set_delay(Duration::from_millis(100)).await;

    let (a, b) = tokio::join!(
        h.resolver.resolve("Heat", None),
        h.resolver.resolve("heat", None)
    );
    let mut statuses = vec![a.unwrap().status, b.unwrap().status];
    statuses.sort_by_key(|s| s.as_str());

    assert_eq!(statuses, vec![ResolveStatus::Delivered, ResolveStatus::InProgress]);
    assert_eq!(h.primary.search_calls().await.len(), 1);
    assert_eq!(h.fetcher.fetched().await.len(), 1);

    let again = h.resolver.resolve("HEAT", None).await.unwrap();
    assert_eq!(again.status, ResolveStatus::Hit);
}

#[tokio::test]
async fn test_season_batch_splits_resolved_and_queued_episodes() {
    let h = TestHarness::new();
    h.primary
        .set_results(vec![
            fixtures::torrent_result("Show S02E01 1080p WEB", "primary", 150),
            fixtures::torrent_result("Show S02E02 720p HDTV", "primary", 40),
            fixtures::torrent_result("Show S02E03 480p", "primary", 400),
            fixtures::torrent_result("Show Season 2 Complete 1080p", "primary", 75),
        ])
        .await;

    let request = SeasonRequest {
        title: "Show".to_string(),
        season: 2,
        episodes: vec![1, 2, 3, 4],
    };
    let outcome = h.resolver.resolve_season(&request, Some("carol")).await.unwrap();

    let status_of = |ep: u32| {
        outcome
            .episodes
            .iter()
            .find(|e| e.episode == ep)
            .map(|e| e.outcome.status)
    };
    assert_eq!(status_of(1), Some(ResolveStatus::Delivered));
    assert_eq!(status_of(2), Some(ResolveStatus::Delivered));
    assert_eq!(status_of(3), Some(ResolveStatus::Queued));
    assert_eq!(status_of(4), Some(ResolveStatus::Queued));
    assert_eq!(outcome.unresolved, vec![3, 4]);
    assert!(outcome.season_pack.is_some());

    let queued: Vec<String> = h
        .resolver
        .queue()
        .list()
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(queued, vec!["show s02e03".to_string(), "show s02e04".to_string()]);

    h.resolver.queue().shutdown();
}
