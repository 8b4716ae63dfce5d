use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delivery::DeliveryError;
use crate::fetcher::FetchError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Queued or running.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

/// Persisted state of the job for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub attempts: u32,
    pub status: JobStatus,
    #[serde(default)]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// What is needed to rebuild the job after a restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl JobRecord {
    pub fn queued(payload: Option<serde_json::Value>) -> Self {
        Self {
            attempts: 0,
            status: JobStatus::Queued,
            last_error: None,
            updated_at: Utc::now(),
            payload,
        }
    }

    pub(crate) fn with_status(&self, status: JobStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Result of `JobQueue::enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Scheduled,
    /// A job for the key is already queued or running.
    AlreadyQueued,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("No candidate found for '{0}'")]
    NoCandidate(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job '{0}' is in flight")]
    InFlight(String),
}

/// A unit of background work.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> Result<(), JobError>;

    /// Persisted with the record so the job can be rebuilt after a restart.
    fn payload(&self) -> Option<serde_json::Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_uses_persisted_field_names() {
        let record = JobRecord::queued(None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["attempts"], 0);
        assert_eq!(json["status"], "queued");
        assert!(json["lastError"].is_null());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_record_reads_legacy_entry() {
        let json = r#"{"attempts": 5, "status": "failed", "lastError": "timeout", "updatedAt": "2024-06-15T10:30:00.000Z"}"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.attempts, 5);
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("timeout"));
        assert!(record.payload.is_none());
    }

    #[test]
    fn test_pending_statuses() {
        assert!(JobStatus::Queued.is_pending());
        assert!(JobStatus::Running.is_pending());
        assert!(!JobStatus::Completed.is_pending());
        assert!(!JobStatus::Failed.is_pending());
    }
}
