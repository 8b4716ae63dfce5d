//! API tests against the in-process router with mocked providers and
//! collaborators.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestConfig, TestFixture};

// =============================================================================
// Health, config, metrics
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
    assert_json_path!(response.body, "providers", json!(1));
    assert_json_path!(response.body, "jobs_in_flight", json!(0));
}

#[tokio::test]
async fn test_config_endpoint_is_sanitized() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["storage"]["backend"], "json");
    assert_eq!(response.body["queue"]["max_retries"], 5);
    assert!(response.body["providers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;

    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("reelcache_http_requests_total"));
    assert!(response.text.contains("reelcache_cache_entries"));
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_delivers_and_caches() {
    let fixture = TestFixture::new().await;
    fixture
        .primary
        .set_results(vec![fixtures::torrent_result(
            "Inception 2010 1080p BluRay",
            "primary",
            200,
        )])
        .await;

    let response = fixture
        .post(
            "/api/v1/resolve",
            json!({ "title": "Inception", "target": "alice" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "key", json!("inception"));
    assert_json_path!(response.body, "status", json!("delivered"));
    assert_json_path!(response.body, "job_queued", json!(false));
    assert_json_path!(response.body, "source_type", json!("torrent"));
    assert!(response.body["file_ref"].is_string());

    let again = fixture
        .post(
            "/api/v1/resolve",
            json!({ "title": "  INCEPTION ", "target": "alice" }),
        )
        .await;
    assert_json_path!(again.body, "status", json!("hit"));
    assert_eq!(fixture.delivery.deliveries().await.len(), 2);
    assert_eq!(fixture.fetcher.fetched().await.len(), 1);
}

#[tokio::test]
async fn test_resolve_unknown_title_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/resolve", json!({ "title": "Zzzznonexistent" }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("not_found"));
    assert_json_path!(response.body, "job_queued", json!(false));

    let jobs = fixture.get("/api/v1/jobs").await;
    assert_json_path!(jobs.body, "total", json!(0));
}

#[tokio::test]
async fn test_resolve_rejects_empty_title() {
    let fixture = TestFixture::new().await;

    let response = fixture.post("/api/v1/resolve", json!({ "title": "   " })).await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
    assert!(fixture.primary.search_calls().await.is_empty());
}

#[tokio::test]
async fn test_resolve_rejects_malformed_json() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_raw("/api/v1/resolve", "{ not json").await;

    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_resolve_low_availability_queues_upgrade() {
    let fixture = TestFixture::with_config(TestConfig {
        with_fallback: true,
    })
    .await;
    fixture
        .primary
        .set_results(vec![fixtures::torrent_result(
            "Obscure Film 1958 720p",
            "primary",
            3,
        )])
        .await;
    fixture
        .fallback
        .as_ref()
        .unwrap()
        .set_results(vec![fixtures::torrent_result(
            "Obscure Film 1958 1080p",
            "fallback",
            1,
        )])
        .await;

    let response = fixture
        .post(
            "/api/v1/resolve",
            json!({ "title": "Obscure Film 1958", "target": "bob" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("queued"));
    assert_json_path!(response.body, "job_queued", json!(true));
    assert!(response.body["warning"].is_string());

    fixture.resolver.queue().wait_idle().await;

    let job = fixture.get("/api/v1/jobs/Obscure%20Film%201958").await;
    assert_status!(job, StatusCode::OK);
    assert_json_path!(job.body, "key", json!("obscure film 1958"));
    assert_json_path!(job.body, "status", json!("completed"));
    assert_json_path!(job.body, "in_flight", json!(false));
}

#[tokio::test]
async fn test_resolve_season() {
    let fixture = TestFixture::new().await;
    fixture
        .primary
        .set_results(vec![
            fixtures::torrent_result("Show S01E01 1080p WEB", "primary", 120),
            fixtures::torrent_result("Show S01E02 720p WEB", "primary", 60),
            fixtures::torrent_result("Show Season 1 Complete 1080p", "primary", 80),
        ])
        .await;

    let response = fixture
        .post(
            "/api/v1/resolve/season",
            json!({ "title": "Show", "season": 1, "episodes": [2, 1, 3, 1] }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let episodes = response.body["episodes"].as_array().unwrap();
    assert_eq!(episodes.len(), 3);
    assert_eq!(episodes[0]["episode"], 1);
    assert_eq!(episodes[0]["status"], "delivered");
    assert_eq!(episodes[1]["status"], "delivered");
    assert_eq!(episodes[2]["status"], "queued");
    assert_json_path!(response.body, "unresolved", json!([3]));
    assert!(response.body["season_pack"].is_object());

    fixture.resolver.queue().shutdown();
}

#[tokio::test]
async fn test_resolve_season_validation() {
    let fixture = TestFixture::new().await;

    let empty = fixture
        .post(
            "/api/v1/resolve/season",
            json!({ "title": "Show", "season": 1, "episodes": [] }),
        )
        .await;
    assert_status!(empty, StatusCode::BAD_REQUEST);

    let too_many: Vec<u32> = (1..=101).collect();
    let response = fixture
        .post(
            "/api/v1/resolve/season",
            json!({ "title": "Show", "season": 1, "episodes": too_many }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let no_title = fixture
        .post(
            "/api/v1/resolve/season",
            json!({ "title": "", "season": 1, "episodes": [1] }),
        )
        .await;
    assert_status!(no_title, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Cache
// =============================================================================

async fn fixture_with_cached_entry() -> TestFixture {
    let fixture = TestFixture::new().await;
    fixture
        .primary
        .set_results(vec![fixtures::torrent_result("Heat 1995 1080p", "primary", 90)])
        .await;
    let response = fixture.post("/api/v1/resolve", json!({ "title": "Heat" })).await;
    assert_json_path!(response.body, "status", json!("delivered"));
    fixture
}

#[tokio::test]
async fn test_cache_stats_and_list() {
    let fixture = fixture_with_cached_entry().await;

    let stats = fixture.get("/api/v1/cache/stats").await;
    assert_status!(stats, StatusCode::OK);
    assert_json_path!(stats.body, "total", json!(1));
    assert_json_path!(stats.body, "active", json!(1));
    assert_json_path!(stats.body, "expired", json!(0));

    let list = fixture.get("/api/v1/cache").await;
    assert_status!(list, StatusCode::OK);
    assert_json_path!(list.body, "total", json!(1));
    assert_eq!(list.body["entries"][0]["key"], "heat");
    assert_eq!(list.body["entries"][0]["source_type"], "torrent");

    let filtered = fixture.get("/api/v1/cache?q=inception").await;
    assert_json_path!(filtered.body, "total", json!(0));
}

#[tokio::test]
async fn test_cache_get_and_delete_entry() {
    let fixture = fixture_with_cached_entry().await;

    let entry = fixture.get("/api/v1/cache/HEAT").await;
    assert_status!(entry, StatusCode::OK);
    assert_json_path!(entry.body, "key", json!("heat"));
    assert_json_path!(entry.body, "expired", json!(false));
    assert!(entry.body["file_id"].is_string());
    assert!(entry.body["downloadedAt"].is_string());

    let deleted = fixture.delete("/api/v1/cache/heat").await;
    assert_status!(deleted, StatusCode::OK);

    let missing = fixture.get("/api/v1/cache/heat").await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    let deleted_again = fixture.delete("/api/v1/cache/heat").await;
    assert_status!(deleted_again, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cache_cleanup_keeps_live_entries() {
    let fixture = fixture_with_cached_entry().await;

    let response = fixture.post_empty("/api/v1/cache/cleanup").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "removed", json!(0));
    let stats = fixture.get("/api/v1/cache/stats").await;
    assert_json_path!(stats.body, "total", json!(1));
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn test_get_unknown_job_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/jobs/nothing").await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture.delete("/api/v1/jobs/nothing").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forget_job_in_flight_conflicts() {
    let fixture = TestFixture::new().await;
    fixture
        .primary
        .set_results(vec![fixtures::torrent_result("Rare Film 1971 720p", "primary", 2)])
        .await;
    // Every upload fails, so the upgrade job waits for a retry.
    fixture.delivery.set_fail_uploads(true).await;

    let response = fixture
        .post("/api/v1/resolve", json!({ "title": "Rare Film 1971" }))
        .await;
    assert_json_path!(response.body, "job_queued", json!(true));

    while fixture
        .resolver
        .queue()
        .get("rare film 1971")
        .unwrap()
        .map(|r| r.attempts)
        .unwrap_or(0)
        == 0
    {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let conflict = fixture.delete("/api/v1/jobs/rare%20film%201971").await;
    assert_status!(conflict, StatusCode::CONFLICT);

    let job = fixture.get("/api/v1/jobs/rare%20film%201971").await;
    assert_json_path!(job.body, "status", json!("queued"));
    assert_json_path!(job.body, "in_flight", json!(true));
    assert_json_path!(job.body, "attempts", json!(1));
    assert!(job.body["lastError"].is_string());

    fixture.resolver.queue().shutdown();
    fixture.resolver.queue().wait_idle().await;

    let forgotten = fixture.delete("/api/v1/jobs/rare%20film%201971").await;
    assert_status!(forgotten, StatusCode::OK);
    let jobs = fixture.get("/api/v1/jobs").await;
    assert_json_path!(jobs.body, "total", json!(0));
}

// =============================================================================
// Providers
// =============================================================================

#[tokio::test]
async fn test_list_providers() {
    let fixture = TestFixture::with_config(TestConfig {
        with_fallback: true,
    })
    .await;

    let response = fixture.get("/api/v1/providers").await;

    assert_status!(response, StatusCode::OK);
    let providers = response.body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    let fallback = providers
        .iter()
        .find(|p| p["name"] == "fallback")
        .expect("fallback provider listed");
    assert_eq!(fallback["tier"], "fallback");
    assert_eq!(fallback["breaker"]["state"], "closed");
}
