//! Outbound delivery: storing resolved files and handing them to a target.
//!
//! `upload` stores an artifact once and returns a reusable `file_ref`;
//! `deliver` hands a stored file to a target; `notify` sends free text.

mod error;
mod fs_channel;
mod types;

pub use error::DeliveryError;
pub use fs_channel::FsDeliveryChannel;
pub use types::{UploadMetadata, UploadReceipt};

use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Identifier recorded with cache entries (`channel_id`).
    fn channel_id(&self) -> Option<String>;

    async fn upload(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
    ) -> Result<UploadReceipt, DeliveryError>;

    async fn deliver(&self, target: &str, file_ref: &str) -> Result<(), DeliveryError>;

    async fn notify(&self, target: &str, text: &str) -> Result<(), DeliveryError>;
}
