use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelcache_core::{
    build_registry, load_config, validate_config, Aggregator, BreakerRegistry, CacheEntry,
    ContentCache, DeliveryChannel, FsDeliveryChannel, IndexStore, JobQueue, JobRecord,
    JsonFileStore, MediaFetcher, Resolver, SqliteIndexStore, StorageBackend, StorageConfig,
    TorrentFileFetcher,
};

use reelcache_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

const CACHE_TABLE: &str = "cache_entries";
const JOB_TABLE: &str = "jobs";

type Stores = (
    Arc<dyn IndexStore<CacheEntry>>,
    Arc<dyn IndexStore<JobRecord>>,
);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("REELCACHE_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn open_stores(storage: &StorageConfig) -> Result<Stores> {
    match storage.backend {
        StorageBackend::Json => {
            let cache_path = storage.cache_index_path();
            let job_path = storage.job_index_path();
            let cache: Arc<dyn IndexStore<CacheEntry>> = Arc::new(
                JsonFileStore::<CacheEntry>::open(&cache_path)
                    .with_context(|| format!("Failed to open cache index {:?}", cache_path))?,
            );
            let jobs: Arc<dyn IndexStore<JobRecord>> = Arc::new(
                JsonFileStore::<JobRecord>::open(&job_path)
                    .with_context(|| format!("Failed to open job index {:?}", job_path))?,
            );
            Ok((cache, jobs))
        }
        StorageBackend::Sqlite => {
            let db_path = storage.database_path();
            let cache: Arc<dyn IndexStore<CacheEntry>> = Arc::new(
                SqliteIndexStore::<CacheEntry>::new(&db_path, CACHE_TABLE)
                    .with_context(|| format!("Failed to open cache table in {:?}", db_path))?,
            );
            let jobs: Arc<dyn IndexStore<JobRecord>> = Arc::new(
                SqliteIndexStore::<JobRecord>::new(&db_path, JOB_TABLE)
                    .with_context(|| format!("Failed to open job table in {:?}", db_path))?,
            );
            Ok((cache, jobs))
        }
    }
}

async fn run() -> Result<()> {
    init_tracing();

    // Determine config path
    let config_path = std::env::var("REELCACHE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!(version = VERSION, "Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        backend = ?config.storage.backend,
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded successfully"
    );

    // Stores
    let (cache_store, job_store) = open_stores(&config.storage)?;
    info!(
        cache_entries = cache_store.len().unwrap_or(0),
        job_records = job_store.len().unwrap_or(0),
        "Index stores opened"
    );

    // Providers
    let registry = build_registry(&config.providers).context("Failed to build providers")?;
    if registry.is_empty() {
        warn!("No providers configured; every resolution will be not_found");
    }
    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let aggregator = Arc::new(Aggregator::new(
        Arc::new(registry),
        breakers,
        config.aggregator.clone(),
    ));

    // Cache and queue
    let cache = Arc::new(ContentCache::new(cache_store, &config.cache));
    let queue = JobQueue::new(job_store, config.queue.clone());

    // Collaborators
    let fetcher: Arc<dyn MediaFetcher> = Arc::new(
        TorrentFileFetcher::new(&config.fetcher).context("Failed to create fetcher")?,
    );
    let delivery: Arc<dyn DeliveryChannel> = Arc::new(FsDeliveryChannel::new(&config.delivery));

    let resolver = Resolver::new(
        config.resolver.clone(),
        Arc::clone(&cache),
        aggregator,
        queue.clone(),
        fetcher,
        delivery,
    );

    // Background cache cleanup
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let cleanup_handle = Arc::clone(&cache).spawn_cleanup_loop(
        Duration::from_secs(config.cache.cleanup_interval_secs.max(1)),
        shutdown_rx,
    );

    if config.queue.resume_on_boot {
        let resumed = queue
            .resume_pending(resolver.job_factory())
            .context("Failed to resume pending jobs")?;
        info!(resumed = resumed, "Resumed pending jobs");
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, resolver));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    queue.shutdown();
    let _ = cleanup_handle.await;
    info!("Background tasks stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
