use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::{JackettProvider, Provider, ProviderError, ProviderTier};
use crate::config::{ProviderConfig, ProviderKind};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate provider name: {0}")]
    Duplicate(String),

    #[error("No provider is enabled")]
    NoneEnabled,

    #[error("Provider '{name}' could not be built: {source}")]
    Build {
        name: String,
        #[source]
        source: ProviderError,
    },
}

/// Registration settings for one provider.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProviderSettings {
    pub tier: ProviderTier,
    /// Lower sorts first.
    pub priority: u32,
    pub enabled: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            tier: ProviderTier::Primary,
            priority: 0,
            enabled: true,
        }
    }
}

/// A registered provider.
#[derive(Clone)]
pub struct ProviderEntry {
    pub adapter: Arc<dyn Provider>,
    pub settings: ProviderSettings,
}

impl ProviderEntry {
    pub fn name(&self) -> &str {
        self.adapter.name()
    }
}

/// Explicit name → adapter registry, in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        adapter: Arc<dyn Provider>,
        settings: ProviderSettings,
    ) -> Result<(), RegistryError> {
        if self.entries.iter().any(|e| e.name() == adapter.name()) {
            return Err(RegistryError::Duplicate(adapter.name().to_string()));
        }
        self.entries.push(ProviderEntry { adapter, settings });
        Ok(())
    }

    /// Builder-style `register`, for tests and fixtures.
    pub fn with(
        mut self,
        adapter: Arc<dyn Provider>,
        settings: ProviderSettings,
    ) -> Result<Self, RegistryError> {
        self.register(adapter, settings)?;
        Ok(self)
    }

    /// Require at least one enabled provider.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.entries.iter().any(|e| e.settings.enabled) {
            Ok(())
        } else {
            Err(RegistryError::NoneEnabled)
        }
    }

    pub fn all(&self) -> &[ProviderEntry] {
        &self.entries
    }

    /// Enabled providers, optionally restricted to one tier.
    pub fn enabled(&self, tier: Option<ProviderTier>) -> Vec<ProviderEntry> {
        self.entries
            .iter()
            .filter(|e| e.settings.enabled)
            .filter(|e| tier.map(|t| e.settings.tier == t).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn has_tier(&self, tier: ProviderTier) -> bool {
        self.entries
            .iter()
            .any(|e| e.settings.enabled && e.settings.tier == tier)
    }

    pub fn priority_of(&self, name: &str) -> u32 {
        self.entries
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.settings.priority)
            .unwrap_or(u32::MAX)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build a registry from `[[providers]]` configuration.
///
/// An empty list yields an empty registry; a non-empty one must have an
/// enabled provider.
pub fn build_registry(configs: &[ProviderConfig]) -> Result<ProviderRegistry, RegistryError> {
    let mut registry = ProviderRegistry::new();
    let mut seen = HashSet::new();

    for config in configs {
        if !seen.insert(config.name.clone()) {
            return Err(RegistryError::Duplicate(config.name.clone()));
        }
        let adapter: Arc<dyn Provider> = match config.kind {
            ProviderKind::Jackett => {
                let jackett = config.jackett.clone().ok_or_else(|| RegistryError::Build {
                    name: config.name.clone(),
                    source: ProviderError::Unavailable("missing [providers.jackett]".to_string()),
                })?;
                let provider = JackettProvider::new(&config.name, jackett).map_err(|source| {
                    RegistryError::Build {
                        name: config.name.clone(),
                        source,
                    }
                })?;
                Arc::new(provider)
            }
        };

        info!(
            provider = %config.name,
            tier = ?config.tier,
            priority = config.priority,
            enabled = config.enabled,
            "Registered provider"
        );

        registry.register(
            adapter,
            ProviderSettings {
                tier: config.tier,
                priority: config.priority,
                enabled: config.enabled,
            },
        )?;
    }

    if !registry.is_empty() {
        registry.validate()?;
    }
    Ok(registry)
}
