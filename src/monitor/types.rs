//! Monitor Types
//!
//! Job-record wire types (catalog side), transfer status types (backend
//! side) and the in-memory `TransferJob` owned by one monitoring task.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::state::JobStatus;

pub type JobId = String;
pub type TransferId = String;
pub type DatasetId = String;

/// Job type under which transfer jobs are filed in the catalog
pub const TRANSFER_JOB_TYPE: &str = "globus_transfer_job";

/// Progress counters reported by the transfer backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobProgress {
    pub bytes_transferred: u64,
    pub files_transferred: u64,
    pub files_total: u64,
}

impl JobProgress {
    pub fn new(bytes_transferred: u64, files_transferred: u64, files_total: u64) -> Self {
        Self {
            bytes_transferred,
            files_transferred,
            files_total,
        }
    }

    /// Merge a newer observation; counters never move backwards.
    pub fn advance(&mut self, observed: JobProgress) {
        self.bytes_transferred = self.bytes_transferred.max(observed.bytes_transferred);
        self.files_transferred = self.files_transferred.max(observed.files_transferred);
        self.files_total = self.files_total.max(observed.files_total);
    }
}

/// The unit tracked by the pool
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub job_id: JobId,
    pub transfer_id: TransferId,
    pub dataset_id: DatasetId,
    pub progress: JobProgress,
    pub status: JobStatus,
    /// Set for failure states, and on a finished job whose dataset could not
    /// be marked ready (997)
    pub error_message: Option<String>,
}

impl TransferJob {
    pub fn new(
        job_id: impl Into<JobId>,
        transfer_id: impl Into<TransferId>,
        dataset_id: impl Into<DatasetId>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            transfer_id: transfer_id.into(),
            dataset_id: dataset_id.into(),
            progress: JobProgress::default(),
            status: JobStatus::Transferring,
            error_message: None,
        }
    }

    /// Snapshot sent with each job-record update
    pub fn result_object(&self) -> JobResult {
        JobResult {
            transfer_id: self.transfer_id.clone(),
            bytes_transferred: self.progress.bytes_transferred,
            files_transferred: self.progress.files_transferred,
            files_total: self.progress.files_total,
            status: self.status,
            error: self.error_message.clone().unwrap_or_default(),
            completed: self.status.is_terminal(),
        }
    }
}

// ============================================================
// CATALOG (JOB RECORD) WIRE TYPES
// ============================================================

/// `jobResultObject` stored on the catalog job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct JobResult {
    /// Records written by earlier deployments name this `globusTaskId`
    #[serde(alias = "globusTaskId")]
    pub transfer_id: TransferId,
    pub bytes_transferred: u64,
    pub files_transferred: u64,
    pub files_total: u64,
    pub status: JobStatus,
    pub error: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub pid: DatasetId,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct JobParams {
    pub dataset_list: Vec<DatasetRef>,
}

/// Job record as returned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRecord {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub owner_user: Option<String>,
    pub owner_group: String,
    pub status_code: String,
    pub status_message: String,
    pub job_params: JobParams,
    pub job_result_object: JobResult,
}

impl JobRecord {
    /// Transfer ID recorded by the submitter, if any
    pub fn transfer_id(&self) -> Option<&str> {
        let id = self.job_result_object.transfer_id.as_str();
        if id.is_empty() { None } else { Some(id) }
    }
}

/// Query filter for listing job records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    pub job_type: String,
    pub completed: bool,
    pub error: String,
}

impl JobFilter {
    /// Transfer jobs neither completed nor carrying a recorded error
    pub fn incomplete() -> Self {
        Self {
            job_type: TRANSFER_JOB_TYPE.to_string(),
            completed: false,
            error: String::new(),
        }
    }

    /// Loopback-style `where` filter understood by the catalog
    pub fn to_query(&self) -> String {
        json!({
            "where": {
                "type": self.job_type,
                "jobResultObject.completed": self.completed,
                "jobResultObject.error": self.error,
            }
        })
        .to_string()
    }
}

// ============================================================
// TRANSFER BACKEND TYPES
// ============================================================

/// State reported by the transfer backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferState {
    Active,
    Inactive,
    Succeeded,
    Failed,
}

/// Status snapshot of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub state: TransferState,
    pub bytes_transferred: u64,
    pub files_transferred: u64,
    pub files_total: u64,
    pub files_skipped: Option<u64>,
    pub failure_code: Option<String>,
    pub failure_description: Option<String>,
}

impl TransferStatus {
    pub fn new(state: TransferState) -> Self {
        Self {
            state,
            bytes_transferred: 0,
            files_transferred: 0,
            files_total: 0,
            files_skipped: None,
            failure_code: None,
            failure_description: None,
        }
    }

    /// Progress with skipped files removed from the total
    pub fn progress(&self) -> JobProgress {
        JobProgress {
            bytes_transferred: self.bytes_transferred,
            files_transferred: self.files_transferred,
            files_total: self
                .files_total
                .saturating_sub(self.files_skipped.unwrap_or(0)),
        }
    }
}

/// One entry of a file-list transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub is_symlink: bool,
}

/// Source/destination pair for a transfer submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEndpoints {
    pub src_collection: String,
    pub src_path: String,
    pub dst_collection: String,
    pub dst_path: String,
}
