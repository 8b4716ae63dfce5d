//! Filesystem-backed delivery channel.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info};

use super::{DeliveryChannel, DeliveryError, UploadMetadata, UploadReceipt};
use crate::config::DeliveryConfig;

const BUFFER_SIZE: usize = 64 * 1024;
const NOTIFICATIONS_FILE: &str = "notifications.log";

/// Stores uploads under `storage_dir/<uuid>/<name>` and delivers by
/// copying into `deliveries_dir/<target>/`.
pub struct FsDeliveryChannel {
    storage_dir: PathBuf,
    deliveries_dir: PathBuf,
    channel_id: Option<String>,
}

impl FsDeliveryChannel {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            storage_dir: config.storage_dir.clone(),
            deliveries_dir: config.deliveries_dir.clone(),
            channel_id: config.channel_id.clone(),
        }
    }

    /// Target directory; targets are a single path segment.
    fn target_dir(&self, target: &str) -> Result<PathBuf, DeliveryError> {
        let target = target.trim();
        let valid = !target.is_empty()
            && target != "."
            && target != ".."
            && target
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
        if !valid {
            return Err(DeliveryError::InvalidTarget(target.to_string()));
        }
        Ok(self.deliveries_dir.join(target))
    }

    /// The stored file for `file_ref`.
    async fn stored_file(&self, file_ref: &str) -> Result<PathBuf, DeliveryError> {
        let valid = !file_ref.is_empty() && file_ref.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
        if !valid {
            return Err(DeliveryError::UnknownFile(file_ref.to_string()));
        }
        let dir = self.storage_dir.join(file_ref);
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|_| DeliveryError::UnknownFile(file_ref.to_string()))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                return Ok(entry.path());
            }
        }
        Err(DeliveryError::UnknownFile(file_ref.to_string()))
    }

    /// Copy `source` to `destination`, returning size and SHA-256.
    async fn copy_with_checksum(
        source: &Path,
        destination: &Path,
    ) -> Result<(u64, String), DeliveryError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeliveryError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                DeliveryError::Io(e)
            }
        })?;
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, File::create(destination).await?);

        let mut hasher = Sha256::new();
        let mut total = 0u64;
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            writer.write_all(&buffer[..n]).await?;
            total += n as u64;
        }
        writer.flush().await?;

        Ok((total, format!("{:x}", hasher.finalize())))
    }
}

#[async_trait]
impl DeliveryChannel for FsDeliveryChannel {
    fn channel_id(&self) -> Option<String> {
        self.channel_id.clone()
    }

    async fn upload(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
    ) -> Result<UploadReceipt, DeliveryError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| DeliveryError::Upload(format!("no file name in {}", path.display())))?;

        let file_ref = uuid::Uuid::new_v4().to_string();
        let dir = self.storage_dir.join(&file_ref);
        fs::create_dir_all(&dir).await?;

        let destination = dir.join(file_name);
        let (size_bytes, sha256) = match Self::copy_with_checksum(path, &destination).await {
            Ok(done) => done,
            Err(e) => {
                let _ = fs::remove_dir_all(&dir).await;
                return Err(e);
            }
        };

        info!(
            key = %metadata.key,
            file_ref = %file_ref,
            bytes = size_bytes,
            "Stored upload"
        );

        Ok(UploadReceipt {
            file_ref,
            message_ref: None,
            size_bytes,
            sha256: Some(sha256),
        })
    }

    async fn deliver(&self, target: &str, file_ref: &str) -> Result<(), DeliveryError> {
        let source = self.stored_file(file_ref).await?;
        let dir = self.target_dir(target)?;
        fs::create_dir_all(&dir).await?;

        let file_name = source
            .file_name()
            .ok_or_else(|| DeliveryError::UnknownFile(file_ref.to_string()))?;
        Self::copy_with_checksum(&source, &dir.join(file_name)).await?;

        debug!(target = target, file_ref = file_ref, "Delivered file");
        Ok(())
    }

    async fn notify(&self, target: &str, text: &str) -> Result<(), DeliveryError> {
        let dir = self.target_dir(target)?;
        fs::create_dir_all(&dir).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(NOTIFICATIONS_FILE))
            .await?;
        let line = format!("{} {}\n", Utc::now().to_rfc3339(), text.replace('\n', " "));
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
