//! Transfer Submitter
//!
//! Admission front door: starts the external transfer, creates its job
//! record and registers the monitoring task. Every error here is returned to
//! the caller synchronously; nothing enters the pool unless all steps succeed.
//!
//! The submitter owns the admission lock that makes `can_admit` + `submit`
//! a single critical section for bounded pools.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::adapters::TransferClient;
use super::error::MonitorError;
use super::pool::TaskPool;
use super::state::{JobStatus, StatusCode};
use super::types::{FileEntry, JobId, JobResult, TransferEndpoints};

/// A request to move one dataset between two facilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub dataset_id: String,
    pub owner_group: String,
    pub source_facility: String,
    pub dest_facility: String,
    pub source_path: String,
    pub dest_path: String,
    /// Explicit file list; `None` syncs the whole source folder
    pub files: Option<Vec<FileEntry>>,
}

pub struct TransferSubmitter {
    pool: TaskPool,
    transfers: Arc<dyn TransferClient>,
    facilities: HashMap<String, String>,
    admission: Mutex<()>,
}

impl TransferSubmitter {
    /// `facilities` maps facility name to transfer collection ID
    pub fn new(
        pool: TaskPool,
        transfers: Arc<dyn TransferClient>,
        facilities: HashMap<String, String>,
    ) -> Self {
        Self {
            pool,
            transfers,
            facilities,
            admission: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    fn collection(&self, facility: &str) -> Result<&str, MonitorError> {
        self.facilities
            .get(facility)
            .map(String::as_str)
            .ok_or_else(|| MonitorError::UnknownFacility(facility.to_string()))
    }

    /// Start a transfer and hand it to the pool, returning the new job ID
    pub async fn submit(&self, request: &TransferRequest) -> Result<JobId, MonitorError> {
        let endpoints = TransferEndpoints {
            src_collection: self.collection(&request.source_facility)?.to_string(),
            src_path: request.source_path.clone(),
            dst_collection: self.collection(&request.dest_facility)?.to_string(),
            dst_path: request.dest_path.clone(),
        };

        // Held until the task is registered so the queue check stays valid
        let _admission = if self.pool.is_bounded() {
            let guard = self.admission.lock().await;
            if !self.pool.can_admit() {
                warn!(dataset_id = %request.dataset_id, "Rejecting transfer, queue is full");
                return Err(MonitorError::QueueFull);
            }
            Some(guard)
        } else {
            None
        };

        let transfer_id = match &request.files {
            Some(files) => self.transfers.submit_file_list(&endpoints, files).await?,
            None => self.transfers.submit_folder_sync(&endpoints).await?,
        };

        let job_id = match self.create_record(request, &transfer_id).await {
            Ok(job_id) => job_id,
            Err(e) => {
                error!(
                    transfer_id = %transfer_id,
                    dataset_id = %request.dataset_id,
                    error = %e,
                    "Job record creation failed, cancelling transfer"
                );
                if let Err(cancel_err) = self.transfers.cancel_transfer(&transfer_id).await {
                    warn!(
                        transfer_id = %transfer_id,
                        error = %cancel_err,
                        "Cancel after failed admission failed"
                    );
                }
                return Err(e);
            }
        };

        self.pool
            .submit(&transfer_id, &request.dataset_id, &job_id)?;
        info!(
            job_id = %job_id,
            transfer_id = %transfer_id,
            dataset_id = %request.dataset_id,
            "Transfer submitted"
        );
        Ok(job_id)
    }

    async fn create_record(
        &self,
        request: &TransferRequest,
        transfer_id: &str,
    ) -> Result<JobId, MonitorError> {
        let jobs = self.pool.job_records();
        let job_id = jobs
            .create_job(&request.owner_group, &request.dataset_id)
            .await?;

        let started = JobResult {
            transfer_id: transfer_id.to_string(),
            status: JobStatus::Transferring,
            ..Default::default()
        };
        jobs.update_job(
            &job_id,
            StatusCode::Started.code(),
            StatusCode::Started.message(),
            &started,
        )
        .await?;
        Ok(job_id)
    }
}
