//! Monitoring Task
//!
//! Per-job state machine. Polls the transfer backend, mirrors progress into
//! the job record, and stops on a terminal transfer state or cancellation.
//!
//! ```text
//!                ┌──────── ACTIVE (write 002, sleep) ───────┐
//!                ▼                                           │
//! TRANSFERRING ──poll──┬─ SUCCEEDED ─▶ FINISHED (003) ─▶ mark ready ─✗─▶ 997
//!      │               ├─ FAILED / INACTIVE ─▶ FAILED (995)
//!      │               └─ poll error ─▶ FAILED (998)
//!      └─cancel signal─▶ cancel transfer ─▶ CANCELLED (003) | FAILED (996)
//! ```
//!
//! Writes to the job record are best-effort: a failed write is logged and the
//! task still reaches its own terminal state.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::adapters::{DataReadyMarker, JobRecordClient, TransferClient};
use super::error::MonitorError;
use super::state::{JobStatus, StatusCode};
use super::types::{TransferJob, TransferState, TransferStatus};

/// Collaborators and timing shared by all tasks of one pool
#[derive(Clone)]
pub struct TaskContext {
    pub jobs: Arc<dyn JobRecordClient>,
    pub transfers: Arc<dyn TransferClient>,
    pub marker: Arc<dyn DataReadyMarker>,
    pub poll_interval: Duration,
    /// Extra polls allowed after a polling error before the job fails
    pub poll_error_retries: u32,
}

pub struct MonitoringTask {
    job: TransferJob,
    ctx: TaskContext,
    cancel: CancellationToken,
}

impl MonitoringTask {
    pub fn new(job: TransferJob, ctx: TaskContext, cancel: CancellationToken) -> Self {
        Self { job, ctx, cancel }
    }

    pub fn job(&self) -> &TransferJob {
        &self.job
    }

    /// Run until a terminal state is reached and return it
    pub async fn run(mut self) -> JobStatus {
        debug!(
            job_id = %self.job.job_id,
            transfer_id = %self.job.transfer_id,
            dataset_id = %self.job.dataset_id,
            "Monitoring task started"
        );

        let mut poll_errors = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return self.cancel_transfer().await;
            }

            let polled = self
                .ctx
                .transfers
                .get_transfer_status(&self.job.transfer_id)
                .await;
            match polled {
                Ok(status) => {
                    poll_errors = 0;
                    if let Some(terminal) = self.on_status(status).await {
                        return terminal;
                    }
                }
                Err(e) if poll_errors < self.ctx.poll_error_retries => {
                    poll_errors += 1;
                    warn!(
                        job_id = %self.job.job_id,
                        transfer_id = %self.job.transfer_id,
                        attempt = poll_errors,
                        error = %e,
                        "Polling transfer failed (will retry)"
                    );
                }
                Err(e) => {
                    let reason = match e {
                        MonitorError::PollingFailed(_, reason) => reason,
                        other => other.to_string(),
                    };
                    let message = format!(
                        "can't continue transfer because an error occurred while polling the task '{}': {}",
                        self.job.transfer_id, reason
                    );
                    return self.finish(StatusCode::PollingFailed, Some(message)).await;
                }
            }

            // Sleep one interval; a cancel request cuts the wait short and is
            // acted upon at the top of the loop.
            tokio::select! {
                _ = tokio::time::sleep(self.ctx.poll_interval) => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }

    /// Apply one successful poll. Returns the terminal state if the job ended.
    async fn on_status(&mut self, status: TransferStatus) -> Option<JobStatus> {
        match status.state {
            TransferState::Active => {
                self.job.progress.advance(status.progress());
                self.write(StatusCode::Transferring).await;
                None
            }
            TransferState::Succeeded => {
                self.job.progress.advance(status.progress());
                let terminal = self.finish(StatusCode::Finished, None).await;
                self.mark_ready().await;
                Some(terminal)
            }
            TransferState::Failed => {
                let message = format!(
                    "task failed with the following error - code: \"{}\" description: \"{}\"",
                    status.failure_code.unwrap_or_default(),
                    status.failure_description.unwrap_or_default()
                );
                Some(self.finish(StatusCode::TransferFailed, Some(message)).await)
            }
            TransferState::Inactive => Some(
                self.finish(
                    StatusCode::TransferFailed,
                    Some("transfer became inactive, manual intervention required".to_string()),
                )
                .await,
            ),
        }
    }

    /// Terminal path for a job cancelled before it got a worker slot
    pub async fn cancel_queued(mut self) -> JobStatus {
        self.cancel_transfer().await
    }

    async fn cancel_transfer(&mut self) -> JobStatus {
        info!(
            job_id = %self.job.job_id,
            transfer_id = %self.job.transfer_id,
            "Cancelling transfer"
        );
        let cancelled = self
            .ctx
            .transfers
            .cancel_transfer(&self.job.transfer_id)
            .await;
        match cancelled {
            Ok(()) => self.finish(StatusCode::Cancelled, None).await,
            Err(e) => {
                self.finish(
                    StatusCode::CancelFailed,
                    Some(format!("failed cancelling transfer task: {}", e)),
                )
                .await
            }
        }
    }

    /// Enter a terminal state and record it
    async fn finish(&mut self, code: StatusCode, error: Option<String>) -> JobStatus {
        self.job.status = code.job_status();
        self.job.error_message = error;
        self.write(code).await;

        match self.job.status {
            JobStatus::Failed => warn!(
                job_id = %self.job.job_id,
                transfer_id = %self.job.transfer_id,
                error = self.job.error_message.as_deref().unwrap_or(""),
                "Transfer job failed"
            ),
            status => info!(
                job_id = %self.job.job_id,
                transfer_id = %self.job.transfer_id,
                status = %status,
                bytes_transferred = self.job.progress.bytes_transferred,
                "Transfer job ended"
            ),
        }
        self.job.status
    }

    /// Mark the dataset ready; on failure downgrade the record once (no retry)
    async fn mark_ready(&mut self) {
        let result = match self.ctx.jobs.access_token().await {
            Ok(token) => {
                self.ctx
                    .marker
                    .mark_data_ready(&self.job.dataset_id, &token)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(
                job_id = %self.job.job_id,
                dataset_id = %self.job.dataset_id,
                error = %e,
                "Transfer finished but dataset could not be marked ready"
            );
            self.job.error_message = Some(e.to_string());
            self.write(StatusCode::MarkReadyFailed).await;
        }
    }

    /// Best-effort write of the current job view
    async fn write(&self, code: StatusCode) {
        debug!(
            job_id = %self.job.job_id,
            transfer_id = %self.job.transfer_id,
            dataset_id = %self.job.dataset_id,
            bytes_transferred = self.job.progress.bytes_transferred,
            files_transferred = self.job.progress.files_transferred,
            files_total = self.job.progress.files_total,
            status = %self.job.status,
            "Task"
        );
        if let Err(e) = self
            .ctx
            .jobs
            .update_job(
                &self.job.job_id,
                code.code(),
                code.message(),
                &self.job.result_object(),
            )
            .await
        {
            error!(
                job_id = %self.job.job_id,
                status_code = code.code(),
                error = %e,
                "Job record update failed"
            );
        }
    }
}
