//! Resolution orchestrator.
//!
//! Turns a free-text title into a delivered file: cache first, then a
//! single-flight aggregation and a selection between immediate delivery
//! and a queued background upgrade.

mod runner;
mod types;
mod upgrade;

pub use runner::Resolver;
pub use types::{
    EpisodeOutcome, ResolveError, ResolveOutcome, ResolveStatus, SeasonOutcome, SeasonRequest,
};
pub use upgrade::{UpgradeJob, UpgradeRequest};
