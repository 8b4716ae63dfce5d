//! Upstream content providers.
//!
//! A `Provider` answers free-text queries with `SearchResult`s. Providers
//! are registered in a `ProviderRegistry` with a tier and priority; the
//! aggregator is the only consumer that absorbs their errors.

mod jackett;
mod registry;
pub mod release;
mod types;

pub use jackett::JackettProvider;
pub use registry::{build_registry, ProviderEntry, ProviderRegistry, ProviderSettings, RegistryError};
pub use types::*;
