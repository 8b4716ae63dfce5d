use serde::{Deserialize, Serialize};

/// Describes what is being uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Cache key the upload belongs to.
    pub key: String,
    /// Human-readable caption.
    pub caption: String,
    pub source_url: String,
}

/// Handle to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Reusable reference for later `deliver` calls.
    pub file_ref: String,
    /// Message the upload was posted as, when the channel has messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_ref: Option<String>,
    pub size_bytes: u64,
    /// Hex SHA-256 of the stored file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}
