use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BreakerState, CircuitBreaker};
use crate::config::BreakerConfig;

/// Status snapshot of one breaker, for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

impl From<&CircuitBreaker> for BreakerStatus {
    fn from(b: &CircuitBreaker) -> Self {
        Self {
            name: b.name().to_string(),
            state: b.state(),
            failure_count: b.failure_count(),
            retry_in_ms: b.retry_in().map(|d| d.as_millis() as u64),
        }
    }
}

/// Process-wide set of breakers, one per provider name.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: std::sync::RwLock<BTreeMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: std::sync::RwLock::new(BTreeMap::new()),
        }
    }

    /// Breaker for `name`, created closed on first use.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self
            .breakers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Arc::clone(existing);
        }

        let mut breakers = self.breakers.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name, &self.config))),
        )
    }

    pub fn snapshot(&self) -> Vec<BreakerStatus> {
        let breakers = self.breakers.read().unwrap_or_else(|e| e.into_inner());
        breakers
            .values()
            .map(|b| BreakerStatus::from(b.as_ref()))
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<BreakerStatus> {
        self.snapshot().into_iter().find(|s| s.name == name)
    }
}
