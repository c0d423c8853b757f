//! Task Pool
//!
//! Admission control and lifecycle bookkeeping for monitoring tasks.
//!
//! - At most `max_concurrency` tasks poll at once (semaphore permits).
//! - Tasks waiting for a permit count against `queue_capacity` (0 = unbounded).
//!   A waiting task that is cancelled leaves the queue at once; it cancels its
//!   transfer without polling and without taking a permit.
//! - The cancellation registry maps `job_id` to a one-shot token. An entry
//!   exists iff the job's task is queued or running: it is inserted together
//!   with submission and removed when the task future completes or is dropped.
//!
//! `can_admit` + `submit` are not atomic. Callers sharing a pool serialize the
//! pair themselves (see `TransferSubmitter`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::adapters::{DataReadyMarker, JobRecordClient, TransferClient};
use super::error::MonitorError;
use super::state::JobStatus;
use super::task::{MonitoringTask, TaskContext};
use super::types::{JobId, TransferJob};

/// Pool sizing and polling configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_concurrency: usize,
    /// Maximum tasks waiting for a worker slot; 0 = unbounded
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub poll_error_retries: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            queue_capacity: 0,
            poll_interval: Duration::from_secs(10),
            poll_error_retries: 0,
        }
    }
}

struct PoolInner {
    ctx: TaskContext,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    queue_capacity: usize,
    waiting: AtomicUsize,
    registry: Mutex<HashMap<JobId, CancellationToken>>,
}

impl PoolInner {
    fn lock_registry(&self) -> MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry entry owned by a spawned task; removing it on drop covers normal
/// completion, panics and runtime shutdown alike.
struct Registration {
    inner: Arc<PoolInner>,
    job_id: JobId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.lock_registry().remove(&self.job_id);
        debug!(job_id = %self.job_id, "Released cancellation registry entry");
    }
}

/// Counts a task as waiting until it obtains a worker slot
struct WaitingSlot {
    inner: Arc<PoolInner>,
    released: bool,
}

impl WaitingSlot {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for WaitingSlot {
    fn drop(&mut self) {
        self.release();
    }
}

/// Bounded pool of monitoring tasks
#[derive(Clone)]
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

impl TaskPool {
    pub fn new(
        config: PoolConfig,
        jobs: Arc<dyn JobRecordClient>,
        transfers: Arc<dyn TransferClient>,
        marker: Arc<dyn DataReadyMarker>,
    ) -> Self {
        let max_concurrency = if config.max_concurrency == 0 {
            PoolConfig::default().max_concurrency
        } else {
            config.max_concurrency
        };

        info!(
            max_concurrency = max_concurrency,
            queue_capacity = config.queue_capacity,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "Creating task pool"
        );

        Self {
            inner: Arc::new(PoolInner {
                ctx: TaskContext {
                    jobs,
                    transfers,
                    marker,
                    poll_interval: config.poll_interval,
                    poll_error_retries: config.poll_error_retries,
                },
                permits: Arc::new(Semaphore::new(max_concurrency)),
                max_concurrency,
                queue_capacity: config.queue_capacity,
                waiting: AtomicUsize::new(0),
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register `job_id` and enqueue its monitoring task. Returns immediately.
    ///
    /// The handle resolves to the task's terminal status. A job that already
    /// has a registered task is rejected with `JobAlreadyActive`.
    pub fn submit(
        &self,
        transfer_id: &str,
        dataset_id: &str,
        job_id: &str,
    ) -> Result<JoinHandle<JobStatus>, MonitorError> {
        let cancel = CancellationToken::new();
        {
            let mut registry = self.inner.lock_registry();
            if registry.contains_key(job_id) {
                return Err(MonitorError::JobAlreadyActive(job_id.to_string()));
            }
            registry.insert(job_id.to_string(), cancel.clone());
            self.inner.waiting.fetch_add(1, Ordering::SeqCst);
        }

        let registration = Registration {
            inner: self.inner.clone(),
            job_id: job_id.to_string(),
        };
        let mut waiting = WaitingSlot {
            inner: self.inner.clone(),
            released: false,
        };

        let job = TransferJob::new(job_id, transfer_id, dataset_id);
        let task = MonitoringTask::new(job, self.inner.ctx.clone(), cancel.clone());
        let permits = self.inner.permits.clone();

        info!(
            job_id = job_id,
            transfer_id = transfer_id,
            dataset_id = dataset_id,
            "Transfer job admitted"
        );

        Ok(tokio::spawn(async move {
            let _registration = registration;
            tokio::select! {
                biased;
                // A queued job is cancelled without taking a worker slot
                _ = cancel.cancelled() => {
                    waiting.release();
                    debug!(
                        job_id = %task.job().job_id,
                        "Cancelled while waiting for a worker slot"
                    );
                    task.cancel_queued().await
                }
                permit = permits.acquire_owned() => {
                    waiting.release();
                    match permit {
                        Ok(_permit) => task.run().await,
                        Err(e) => {
                            error!(job_id = %task.job().job_id, error = %e, "Worker pool closed");
                            JobStatus::Failed
                        }
                    }
                }
            }
        }))
    }

    /// Whether another job fits in the queue
    pub fn can_admit(&self) -> bool {
        self.inner.queue_capacity == 0
            || self.inner.waiting.load(Ordering::SeqCst) < self.inner.queue_capacity
    }

    pub fn is_bounded(&self) -> bool {
        self.inner.queue_capacity > 0
    }

    /// Request cancellation of a queued or running job.
    ///
    /// Non-blocking; the task observes the signal at its next loop boundary.
    pub fn cancel(&self, job_id: &str) -> Result<(), MonitorError> {
        let registry = self.inner.lock_registry();
        match registry.get(job_id) {
            Some(token) => {
                token.cancel();
                info!(job_id = job_id, "Cancellation requested");
                Ok(())
            }
            None => Err(MonitorError::JobNotFound(job_id.to_string())),
        }
    }

    /// Cancel (best effort) and delete the job record.
    pub async fn delete(&self, job_id: &str) -> Result<(), MonitorError> {
        if let Err(e) = self.cancel(job_id) {
            debug!(job_id = job_id, error = %e, "No running task to cancel before delete");
        }
        self.inner.ctx.jobs.delete_job(job_id).await?;
        info!(job_id = job_id, "Job record deleted");
        Ok(())
    }

    /// Whether `job_id` currently has a queued or running task
    pub fn is_registered(&self, job_id: &str) -> bool {
        self.inner.lock_registry().contains_key(job_id)
    }

    /// Number of queued + running tasks
    pub fn active_jobs(&self) -> usize {
        self.inner.lock_registry().len()
    }

    /// Number of tasks waiting for a worker slot
    pub fn waiting(&self) -> usize {
        self.inner.waiting.load(Ordering::SeqCst)
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Access to the job-record client for recovery and the submitter
    pub fn job_records(&self) -> &Arc<dyn JobRecordClient> {
        &self.inner.ctx.jobs
    }
}
