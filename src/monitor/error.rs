//! Monitor Error Types

use thiserror::Error;

/// Errors raised by the task pool, its collaborators and the submitter.
///
/// `code()` gives a stable identifier for API responses.
#[derive(Error, Debug, Clone)]
pub enum MonitorError {
    // === Pool / Registry ===
    #[error("job with ID '{0}' does not exist or is already cancelled/removed")]
    JobNotFound(String),

    #[error("job with ID '{0}' already has an active monitoring task")]
    JobAlreadyActive(String),

    #[error("the task queue is currently full, try again later")]
    QueueFull,

    // === Catalog ===
    #[error("job record '{0}' doesn't exist in the catalog")]
    JobRecordAbsent(String),

    #[error("job record '{0}' was not found")]
    JobRecordNotFound(String),

    #[error("catalog request failed: {0}")]
    CatalogError(String),

    #[error("dataset could not be marked ready: {0}")]
    MarkReadyFailed(String),

    #[error("credential refresh failed: {0}")]
    CredentialRefreshFailed(String),

    // === Transfer backend ===
    #[error("transfer submission failed: {0}")]
    TransferSubmissionFailed(String),

    #[error("polling transfer '{0}' failed: {1}")]
    PollingFailed(String, String),

    #[error("cancelling transfer '{0}' failed: {1}")]
    TransferCancelFailed(String, String),

    // === Admission ===
    #[error("unknown facility: {0}")]
    UnknownFacility(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl MonitorError {
    pub fn code(&self) -> &'static str {
        match self {
            MonitorError::JobNotFound(_) => "JOB_NOT_FOUND",
            MonitorError::JobAlreadyActive(_) => "JOB_ALREADY_ACTIVE",
            MonitorError::QueueFull => "QUEUE_FULL",
            MonitorError::JobRecordAbsent(_) => "JOB_RECORD_ABSENT",
            MonitorError::JobRecordNotFound(_) => "JOB_RECORD_NOT_FOUND",
            MonitorError::CatalogError(_) => "CATALOG_ERROR",
            MonitorError::MarkReadyFailed(_) => "MARK_READY_FAILED",
            MonitorError::CredentialRefreshFailed(_) => "CREDENTIAL_REFRESH_FAILED",
            MonitorError::TransferSubmissionFailed(_) => "TRANSFER_SUBMISSION_FAILED",
            MonitorError::PollingFailed(..) => "POLLING_FAILED",
            MonitorError::TransferCancelFailed(..) => "TRANSFER_CANCEL_FAILED",
            MonitorError::UnknownFacility(_) => "UNKNOWN_FACILITY",
            MonitorError::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Get HTTP status code suggestion for the surrounding service
    pub fn http_status(&self) -> u16 {
        match self {
            MonitorError::JobNotFound(_)
            | MonitorError::JobRecordAbsent(_)
            | MonitorError::JobRecordNotFound(_)
            | MonitorError::TransferSubmissionFailed(_) => 400,
            MonitorError::UnknownFacility(_) => 403,
            MonitorError::JobAlreadyActive(_) => 409,
            MonitorError::QueueFull => 503,
            MonitorError::CatalogError(_)
            | MonitorError::MarkReadyFailed(_)
            | MonitorError::CredentialRefreshFailed(_)
            | MonitorError::PollingFailed(..)
            | MonitorError::TransferCancelFailed(..)
            | MonitorError::ConfigError(_) => 500,
        }
    }

    /// The job is already gone (never existed, finished, cancelled or deleted).
    ///
    /// Callers report these as "job absent or already finished" rather than
    /// as backend failures.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            MonitorError::JobNotFound(_)
                | MonitorError::JobRecordAbsent(_)
                | MonitorError::JobRecordNotFound(_)
        )
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(e: reqwest::Error) -> Self {
        MonitorError::CatalogError(e.to_string())
    }
}
