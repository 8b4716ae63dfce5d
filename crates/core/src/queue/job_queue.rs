use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};

use super::types::{EnqueueOutcome, Job, JobError, JobRecord, JobStatus, QueueError};
use crate::cache::cache_key;
use crate::config::QueueConfig;
use crate::metrics;
use crate::store::IndexStore;

/// Rebuilds a job from its key and persisted record (for boot-time resume).
pub type JobFactory = Arc<dyn Fn(&str, &JobRecord) -> Option<Arc<dyn Job>> + Send + Sync>;

/// Delay before the retry that follows failed attempt number `attempts`:
/// `base * 2^(attempts - 1)`.
pub fn backoff_delay(base: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent)
}

struct Inner {
    store: Arc<dyn IndexStore<JobRecord>>,
    config: QueueConfig,
    inflight: Mutex<HashSet<String>>,
    permits: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Inner {
    fn inflight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self, key: &str, record: &JobRecord) {
        if let Err(e) = self.store.put(key, record.clone()) {
            error!(key = key, error = %e, "Failed to persist job record");
        }
    }
}

/// Crash-tolerant background queue.
///
/// At most one job per key is queued or running; records survive restarts
/// in the job index. Jobs execute on spawned tasks, at most
/// `max_concurrent_jobs` at a time; a job waiting out its backoff holds no
/// permit.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn IndexStore<JobRecord>>, config: QueueConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                inflight: Mutex::new(HashSet::new()),
                permits,
                shutdown_tx,
            }),
        }
    }

    /// Schedule `job` under `key` unless a job for the key is already in
    /// flight or persisted as queued/running.
    ///
    /// A completed or failed record is requeued with its attempt count kept,
    /// so a key that exhausted its retries gets one more attempt before it
    /// fails again.
    pub fn enqueue(&self, key: &str, job: Arc<dyn Job>) -> Result<EnqueueOutcome, QueueError> {
        let key = cache_key(key);
        let record = {
            let mut inflight = self.inner.inflight();
            if inflight.contains(&key) {
                debug!(key = %key, "Job already in flight");
                return Ok(EnqueueOutcome::AlreadyQueued);
            }
            let record = match self.inner.store.get(&key)? {
                Some(existing) if existing.status.is_pending() => {
                    debug!(key = %key, status = ?existing.status, "Job already persisted as pending");
                    return Ok(EnqueueOutcome::AlreadyQueued);
                }
                Some(existing) => JobRecord {
                    payload: job.payload(),
                    ..existing.with_status(JobStatus::Queued)
                },
                None => JobRecord::queued(job.payload()),
            };
            self.inner.store.put(&key, record.clone())?;
            inflight.insert(key.clone());
            record
        };

        info!(key = %key, "Enqueued background job");
        self.spawn(key, job, record);
        Ok(EnqueueOutcome::Scheduled)
    }

    /// Re-schedule persisted queued/running jobs through `factory`.
    ///
    /// Records the factory cannot rebuild are marked failed. Returns how
    /// many jobs were scheduled.
    pub fn resume_pending(&self, factory: JobFactory) -> Result<usize, QueueError> {
        let mut resumed = 0;
        for (key, record) in self.inner.store.all()? {
            if !record.status.is_pending() {
                continue;
            }
            let Some(job) = factory(&key, &record) else {
                warn!(key = %key, "Cannot rebuild pending job, marking failed");
                let mut failed = record.with_status(JobStatus::Failed);
                failed.last_error = Some("not resumable".to_string());
                self.inner.store.put(&key, failed)?;
                continue;
            };

            let record = {
                let mut inflight = self.inner.inflight();
                if !inflight.insert(key.clone()) {
                    continue;
                }
                let record = record.with_status(JobStatus::Queued);
                self.inner.store.put(&key, record.clone())?;
                record
            };

            info!(key = %key, attempts = record.attempts, "Resuming background job");
            self.spawn(key, job, record);
            resumed += 1;
        }
        Ok(resumed)
    }

    pub fn get(&self, key: &str) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.inner.store.get(&cache_key(key))?)
    }

    pub fn list(&self) -> Result<Vec<(String, JobRecord)>, QueueError> {
        Ok(self.inner.store.all()?)
    }

    /// Drop the record for a key that is not in flight.
    pub fn forget(&self, key: &str) -> Result<bool, QueueError> {
        let key = cache_key(key);
        let inflight = self.inner.inflight();
        if inflight.contains(&key) {
            return Err(QueueError::InFlight(key));
        }
        Ok(self.inner.store.remove(&key)?)
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.inflight().contains(&cache_key(key))
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.inflight().len()
    }

    /// Wait until no job is in flight.
    pub async fn wait_idle(&self) {
        while self.in_flight_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop scheduling retries. Jobs waiting for a retry stay `queued` in the
    /// index.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(());
    }

    fn spawn(&self, key: String, job: Arc<dyn Job>, record: JobRecord) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            Self::drive(&inner, &key, job, record).await;
            inner.inflight().remove(&key);
        });
    }

    async fn drive(inner: &Inner, key: &str, job: Arc<dyn Job>, mut record: JobRecord) {
        let mut shutdown_rx = inner.shutdown_tx.subscribe();
        let base = Duration::from_secs(inner.config.base_delay_secs);

        loop {
            let permit = tokio::select! {
                _ = shutdown_rx.recv() => return,
                permit = Arc::clone(&inner.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            record = record.with_status(JobStatus::Running);
            inner.save(key, &record);
            debug!(key = key, attempt = record.attempts + 1, "Running job");

            let outcome = match AssertUnwindSafe(job.run()).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(JobError::Panicked(panic_message(&panic))),
            };
            drop(permit);

            let e = match outcome {
                Ok(()) => {
                    record = record.with_status(JobStatus::Completed);
                    record.last_error = None;
                    inner.save(key, &record);
                    metrics::JOB_RUNS.with_label_values(&["completed"]).inc();
                    info!(key = key, attempts = record.attempts, "Job completed");
                    return;
                }
                Err(e) => e,
            };

            record.attempts = record.attempts.saturating_add(1).min(inner.config.max_retries);
            record.last_error = Some(e.to_string());

            if record.attempts >= inner.config.max_retries {
                record = record.with_status(JobStatus::Failed);
                inner.save(key, &record);
                metrics::JOB_RUNS.with_label_values(&["failed"]).inc();
                error!(key = key, attempts = record.attempts, error = %e, "Job failed permanently");
                return;
            }

            record = record.with_status(JobStatus::Queued);
            inner.save(key, &record);
            metrics::JOB_RUNS.with_label_values(&["retry"]).inc();
            metrics::JOB_RETRIES_SCHEDULED.inc();

            let delay = backoff_delay(base, record.attempts);
            warn!(
                key = key,
                attempts = record.attempts,
                retry_in_secs = delay.as_secs(),
                error = %e,
                "Job failed, retry scheduled"
            );

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(key = key, "Queue shutting down, leaving job queued");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIndexStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Fails the first `failures` runs, then succeeds.
    struct FlakyJob {
        failures: u32,
        runs: AtomicU32,
        started: std::sync::Mutex<Vec<Instant>>,
    }

    impl FlakyJob {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                runs: AtomicU32::new(0),
                started: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn runs(&self) -> u32 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for FlakyJob {
        async fn run(&self) -> Result<(), JobError> {
            self.started.lock().unwrap().push(Instant::now());
            let n = self.runs.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(JobError::Other(format!("failure {}", n + 1)))
            } else {
                Ok(())
            }
        }
    }

    fn queue(max_concurrent_jobs: usize) -> JobQueue {
        JobQueue::new(
            Arc::new(MemoryIndexStore::<JobRecord>::new()),
            QueueConfig {
                max_retries: 5,
                base_delay_secs: 60,
                max_concurrent_jobs,
                resume_on_boot: false,
            },
        )
    }

    #[test]
    fn test_backoff_delay_schedule() {
        let base = Duration::from_secs(60);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(120));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(240));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(480));
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, 200), backoff_delay(base, 32));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_marks_completed() {
        let queue = queue(1);
        let job = FlakyJob::new(0);
        assert_eq!(
            queue.enqueue("Film", job.clone()).unwrap(),
            EnqueueOutcome::Scheduled
        );
        queue.wait_idle().await;

        let record = queue.get("film").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.attempts, 0);
        assert!(record.last_error.is_none());
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_then_success() {
        let queue = queue(1);
        let job = FlakyJob::new(3);
        queue.enqueue("film", job.clone()).unwrap();
        queue.wait_idle().await;

        let started = job.started.lock().unwrap().clone();
        assert_eq!(started.len(), 4);
        assert_eq!(started[1] - started[0], Duration::from_secs(60));
        assert_eq!(started[2] - started[1], Duration::from_secs(120));
        assert_eq!(started[3] - started[2], Duration::from_secs(240));

        let record = queue.get("film").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.attempts, 3);
        assert!(record.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_permanently_after_max_retries() {
        let queue = queue(1);
        let job = FlakyJob::new(u32::MAX);
        queue.enqueue("film", job.clone()).unwrap();
        queue.wait_idle().await;

        assert_eq!(job.runs(), 5);
        let record = queue.get("film").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.attempts, 5);
        assert_eq!(record.last_error.as_deref(), Some("failure 5"));

        // Frozen: nothing runs later.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(job.runs(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_enqueue_is_noop() {
        let queue = queue(1);
        let job = FlakyJob::new(1);
        assert_eq!(
            queue.enqueue("film", job.clone()).unwrap(),
            EnqueueOutcome::Scheduled
        );
        assert_eq!(
            queue.enqueue(" FILM ", FlakyJob::new(0)).unwrap(),
            EnqueueOutcome::AlreadyQueued
        );
        assert_eq!(queue.list().unwrap().len(), 1);

        queue.wait_idle().await;
        assert_eq!(job.runs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_pending_record_blocks_enqueue() {
        let store: Arc<dyn IndexStore<JobRecord>> = Arc::new(MemoryIndexStore::new());
        let mut stale = JobRecord::queued(None);
        stale.status = JobStatus::Running;
        store.put("film", stale).unwrap();

        let queue = JobQueue::new(store, QueueConfig::default());
        let job = FlakyJob::new(0);
        assert_eq!(
            queue.enqueue("film", job.clone()).unwrap(),
            EnqueueOutcome::AlreadyQueued
        );
        assert_eq!(job.runs(), 0);

        assert!(queue.forget("film").unwrap());
        assert_eq!(
            queue.enqueue("film", job.clone()).unwrap(),
            EnqueueOutcome::Scheduled
        );
        queue.wait_idle().await;
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_key_can_be_enqueued_again() {
        let queue = queue(1);
        queue.enqueue("film", FlakyJob::new(2)).unwrap();
        queue.wait_idle().await;
        assert_eq!(queue.get("film").unwrap().unwrap().attempts, 2);

        queue.enqueue("film", FlakyJob::new(0)).unwrap();
        queue.wait_idle().await;
        let record = queue.get("film").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeued_failed_key_runs_once_more() {
        let queue = queue(1);
        let job = FlakyJob::new(u32::MAX);
        queue.enqueue("film", job.clone()).unwrap();
        queue.wait_idle().await;
        assert_eq!(job.runs(), 5);

        assert_eq!(
            queue.enqueue("film", job.clone()).unwrap(),
            EnqueueOutcome::Scheduled
        );
        queue.wait_idle().await;

        assert_eq!(job.runs(), 6);
        let record = queue.get("film").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.attempts, 5);
        assert_eq!(record.last_error.as_deref(), Some("failure 6"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_in_flight_is_rejected() {
        let queue = queue(1);
        queue.enqueue("film", FlakyJob::new(1)).unwrap();
        assert!(matches!(
            queue.forget("film"),
            Err(QueueError::InFlight(_))
        ));
        queue.wait_idle().await;
        assert!(queue.forget("film").unwrap());
        assert!(queue.get("film").unwrap().is_none());
    }

    struct PanickingJob;

    #[async_trait]
    impl Job for PanickingJob {
        async fn run(&self) -> Result<(), JobError> {
            panic!("kaboom");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_counts_as_failure() {
        let queue = queue(1);
        queue.enqueue("boom", Arc::new(PanickingJob)).unwrap();
        queue.wait_idle().await;

        let record = queue.get("boom").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("Job panicked: kaboom"));
        assert!(!queue.is_in_flight("boom"));
    }

    /// Tracks the highest number of concurrently running jobs.
    struct GaugeJob {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Job for GaugeJob {
        async fn run(&self) -> Result<(), JobError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit() {
        for limit in [1usize, 2] {
            let queue = queue(limit);
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            for i in 0..4 {
                queue
                    .enqueue(
                        &format!("job-{}", i),
                        Arc::new(GaugeJob {
                            running: running.clone(),
                            peak: peak.clone(),
                        }),
                    )
                    .unwrap();
            }
            queue.wait_idle().await;
            assert_eq!(peak.load(Ordering::SeqCst), limit);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_pending_uses_factory() {
        let store: Arc<dyn IndexStore<JobRecord>> = Arc::new(MemoryIndexStore::new());
        let mut running = JobRecord::queued(Some(serde_json::json!({"title": "Film"})));
        running.status = JobStatus::Running;
        running.attempts = 2;
        store.put("film", running).unwrap();
        store.put("orphan", JobRecord::queued(None)).unwrap();
        let mut done = JobRecord::queued(None);
        done.status = JobStatus::Completed;
        store.put("done", done).unwrap();

        let queue = JobQueue::new(store, QueueConfig::default());
        let job = FlakyJob::new(0);
        let factory_job = job.clone();
        let factory: JobFactory = Arc::new(move |_key, record| {
            record
                .payload
                .as_ref()
                .map(|_| factory_job.clone() as Arc<dyn Job>)
        });

        assert_eq!(queue.resume_pending(factory).unwrap(), 1);
        queue.wait_idle().await;

        assert_eq!(job.runs(), 1);
        let film = queue.get("film").unwrap().unwrap();
        assert_eq!(film.status, JobStatus::Completed);
        assert_eq!(film.attempts, 2);

        let orphan = queue.get("orphan").unwrap().unwrap();
        assert_eq!(orphan.status, JobStatus::Failed);
        assert_eq!(queue.get("done").unwrap().unwrap().status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_leaves_retry_queued() {
        let queue = queue(1);
        let job = FlakyJob::new(u32::MAX);
        queue.enqueue("film", job.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs(), 1);
        queue.shutdown();
        queue.wait_idle().await;

        let record = queue.get("film").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.attempts, 1);
        assert_eq!(job.runs(), 1);
    }
}
