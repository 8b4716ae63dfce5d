//! Durable one-job-per-key background queue with bounded retries and
//! exponential backoff.

mod job_queue;
mod types;

pub use job_queue::{backoff_delay, JobFactory, JobQueue};
pub use types::{EnqueueOutcome, Job, JobError, JobRecord, JobStatus, QueueError};
