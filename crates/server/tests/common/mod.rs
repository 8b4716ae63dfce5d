//! Common test utilities for in-process API testing with mocks.
//!
//! The fixture wires a real resolver (cache, queue, aggregator, breakers)
//! to mock providers and collaborators, then drives the Axum router with
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use reelcache_core::{
    provider::ProviderSettings,
    testing::{MockDelivery, MockFetcher, MockProvider},
    Aggregator, BreakerRegistry, CacheEntry, Config, ContentCache, JobQueue, JobRecord,
    JsonFileStore, ProviderRegistry, ProviderTier, Resolver, StorageConfig,
};

/// Re-export fixtures for test convenience
pub use reelcache_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// Provides an in-process router with controllable mocks for:
/// - Search providers (`primary`, and `fallback` when enabled)
/// - Fetching (MockFetcher)
/// - Upload and delivery (MockDelivery)
pub struct TestFixture {
    pub router: Router,
    pub primary: Arc<MockProvider>,
    pub fallback: Option<Arc<MockProvider>>,
    pub fetcher: Arc<MockFetcher>,
    pub delivery: Arc<MockDelivery>,
    pub resolver: Resolver,
    /// Holds the JSON indices
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Register a fallback-tier provider next to the primary one
    pub with_fallback: bool,
}

impl TestFixture {
    /// Create a new test fixture with a single primary provider.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            storage: StorageConfig {
                data_dir: temp_dir.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        };

        let cache_store = JsonFileStore::<CacheEntry>::open(config.storage.cache_index_path())
            .expect("Failed to open cache index");
        let job_store = JsonFileStore::<JobRecord>::open(config.storage.job_index_path())
            .expect("Failed to open job index");

        let primary = Arc::new(MockProvider::new("primary"));
        let mut registry = ProviderRegistry::new()
            .with(primary.clone(), ProviderSettings::default())
            .expect("Failed to register primary provider");

        let fallback = if test_config.with_fallback {
            let fallback = Arc::new(MockProvider::new("fallback"));
            registry = registry
                .with(
                    fallback.clone(),
                    ProviderSettings {
                        tier: ProviderTier::Fallback,
                        ..Default::default()
                    },
                )
                .expect("Failed to register fallback provider");
            Some(fallback)
        } else {
            None
        };

        let aggregator = Arc::new(Aggregator::new(
            Arc::new(registry),
            Arc::new(BreakerRegistry::new(config.breaker.clone())),
            config.aggregator.clone(),
        ));
        let cache = Arc::new(ContentCache::new(Arc::new(cache_store), &config.cache));
        let queue = JobQueue::new(Arc::new(job_store), config.queue.clone());
        let fetcher = Arc::new(MockFetcher::new());
        let delivery = Arc::new(MockDelivery::new());

        let resolver = Resolver::new(
            config.resolver.clone(),
            cache,
            aggregator,
            queue,
            fetcher.clone(),
            delivery.clone(),
        );

        let state = Arc::new(reelcache_server::state::AppState::new(
            config,
            resolver.clone(),
        ));
        let router = reelcache_server::api::create_router(state);

        Self {
            router,
            primary,
            fallback,
            fetcher,
            delivery,
            resolver,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
