use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Unknown file reference: {0}")]
    UnknownFile(String),

    #[error("Invalid delivery target: {0}")]
    InvalidTarget(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
