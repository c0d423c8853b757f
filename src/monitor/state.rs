//! Monitoring Task State Definitions
//!
//! `JobStatus` is the lifecycle state mirrored into the catalog job record.
//! `StatusCode` is the (code, message) pair the catalog stores next to it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Job lifecycle state
///
/// Terminal states: FINISHED, FAILED, CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Initial state - transfer submitted and being polled
    #[default]
    Transferring,

    /// Terminal: backend reported success
    Finished,

    /// Terminal: backend failure, polling error or failed cancel
    Failed,

    /// Terminal: cancelled on request
    Cancelled,
}

impl JobStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Transferring)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Transferring => "transferring",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status code/message pairs written to the job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Started,
    Transferring,
    Finished,
    Cancelled,
    TransferFailed,
    CancelFailed,
    MarkReadyFailed,
    PollingFailed,
}

impl StatusCode {
    pub fn code(&self) -> &'static str {
        match self {
            StatusCode::Started => "001",
            StatusCode::Transferring => "002",
            StatusCode::Finished | StatusCode::Cancelled => "003",
            StatusCode::TransferFailed => "995",
            StatusCode::CancelFailed => "996",
            StatusCode::MarkReadyFailed => "997",
            StatusCode::PollingFailed => "998",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StatusCode::Started => "started",
            StatusCode::Transferring => "transferring",
            StatusCode::Finished => "finished",
            StatusCode::Cancelled => "cancelled",
            StatusCode::TransferFailed => "transfer failed",
            StatusCode::CancelFailed => "cancelling failed",
            StatusCode::MarkReadyFailed => "finished but dataset could not be marked ready",
            StatusCode::PollingFailed => {
                "an error has occurred during task polling, this job is not updated anymore"
            }
        }
    }

    /// Job status persisted alongside this code
    pub fn job_status(&self) -> JobStatus {
        match self {
            StatusCode::Started | StatusCode::Transferring => JobStatus::Transferring,
            StatusCode::Finished | StatusCode::MarkReadyFailed => JobStatus::Finished,
            StatusCode::Cancelled => JobStatus::Cancelled,
            StatusCode::TransferFailed | StatusCode::CancelFailed | StatusCode::PollingFailed => {
                JobStatus::Failed
            }
        }
    }
}
