use reelcache_core::{
    Aggregator, Config, ContentCache, JobQueue, Resolver, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    resolver: Resolver,
}

impl AppState {
    pub fn new(config: Config, resolver: Resolver) -> Self {
        Self { config, resolver }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn cache(&self) -> &ContentCache {
        self.resolver.cache()
    }

    pub fn queue(&self) -> &JobQueue {
        self.resolver.queue()
    }

    pub fn aggregator(&self) -> &Aggregator {
        self.resolver.aggregator()
    }
}
