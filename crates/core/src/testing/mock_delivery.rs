//! Mock delivery channel for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::delivery::{DeliveryChannel, DeliveryError, UploadMetadata, UploadReceipt};

/// Records uploads, deliveries and notifications in memory.
pub struct MockDelivery {
    uploads: Arc<RwLock<Vec<UploadMetadata>>>,
    deliveries: Arc<RwLock<Vec<(String, String)>>>,
    notifications: Arc<RwLock<Vec<(String, String)>>>,
    /// `file_ref`s whose delivery fails.
    rejected: Arc<RwLock<HashSet<String>>>,
    fail_uploads: Arc<RwLock<bool>>,
    fail_deliveries: Arc<RwLock<bool>>,
}

impl Default for MockDelivery {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDelivery {
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(RwLock::new(Vec::new())),
            deliveries: Arc::new(RwLock::new(Vec::new())),
            notifications: Arc::new(RwLock::new(Vec::new())),
            rejected: Arc::new(RwLock::new(HashSet::new())),
            fail_uploads: Arc::new(RwLock::new(false)),
            fail_deliveries: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn uploads(&self) -> Vec<UploadMetadata> {
        self.uploads.read().await.clone()
    }

    /// `(target, file_ref)` pairs in delivery order.
    pub async fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.read().await.clone()
    }

    /// `(target, text)` pairs in order.
    pub async fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.read().await.clone()
    }

    /// Make deliveries of `file_ref` fail as if the stored file was gone.
    pub async fn reject_file(&self, file_ref: &str) {
        self.rejected.write().await.insert(file_ref.to_string());
    }

    pub async fn set_fail_uploads(&self, fail: bool) {
        *self.fail_uploads.write().await = fail;
    }

    /// Make every delivery fail, whatever the file.
    pub async fn set_fail_deliveries(&self, fail: bool) {
        *self.fail_deliveries.write().await = fail;
    }
}

#[async_trait]
impl DeliveryChannel for MockDelivery {
    fn channel_id(&self) -> Option<String> {
        Some("mock-channel".to_string())
    }

    async fn upload(
        &self,
        _path: &Path,
        metadata: &UploadMetadata,
    ) -> Result<UploadReceipt, DeliveryError> {
        if *self.fail_uploads.read().await {
            return Err(DeliveryError::Upload("mock upload failure".to_string()));
        }
        self.uploads.write().await.push(metadata.clone());
        Ok(UploadReceipt {
            file_ref: uuid::Uuid::new_v4().to_string(),
            message_ref: None,
            size_bytes: 0,
            sha256: None,
        })
    }

    async fn deliver(&self, target: &str, file_ref: &str) -> Result<(), DeliveryError> {
        if *self.fail_deliveries.read().await {
            return Err(DeliveryError::Io(std::io::Error::other("mock delivery failure")));
        }
        if self.rejected.read().await.contains(file_ref) {
            return Err(DeliveryError::UnknownFile(file_ref.to_string()));
        }
        self.deliveries
            .write()
            .await
            .push((target.to_string(), file_ref.to_string()));
        Ok(())
    }

    async fn notify(&self, target: &str, text: &str) -> Result<(), DeliveryError> {
        self.notifications
            .write()
            .await
            .push((target.to_string(), text.to_string()));
        Ok(())
    }
}
