//! External Collaborator Adapters
//!
//! Traits for the two remote systems the monitor talks to, plus their HTTP
//! implementations. Every monitoring task holds the clients as trait objects
//! so tests can substitute recording mocks.

pub mod catalog;
pub mod credentials;
pub mod transfer_api;

#[cfg(test)]
pub mod mock;

pub use catalog::HttpCatalogClient;
pub use credentials::{AccessToken, TokenCache};
pub use transfer_api::HttpTransferClient;

use async_trait::async_trait;

use super::error::MonitorError;
use super::types::{
    DatasetId, FileEntry, JobFilter, JobId, JobRecord, JobResult, TransferEndpoints, TransferId,
    TransferStatus,
};

/// Catalog job-record operations
#[async_trait]
pub trait JobRecordClient: Send + Sync {
    /// Create a transfer job record, returning its ID
    async fn create_job(
        &self,
        owner_group: &str,
        dataset_id: &str,
    ) -> Result<JobId, MonitorError>;

    async fn update_job(
        &self,
        job_id: &str,
        status_code: &str,
        status_message: &str,
        progress: &JobResult,
    ) -> Result<(), MonitorError>;

    /// Fails with `JobRecordAbsent` when the catalog has no such job
    async fn delete_job(&self, job_id: &str) -> Result<(), MonitorError>;

    /// Fails with `JobRecordNotFound` when the catalog has no such job
    async fn get_job(&self, job_id: &str) -> Result<JobRecord, MonitorError>;

    async fn list_incomplete_jobs(&self, filter: &JobFilter)
    -> Result<Vec<JobRecord>, MonitorError>;

    /// Current service credential, refreshed when close to expiry
    async fn access_token(&self) -> Result<String, MonitorError>;
}

/// Transfer backend operations
#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn submit_file_list(
        &self,
        endpoints: &TransferEndpoints,
        files: &[FileEntry],
    ) -> Result<TransferId, MonitorError>;

    async fn submit_folder_sync(
        &self,
        endpoints: &TransferEndpoints,
    ) -> Result<TransferId, MonitorError>;

    async fn get_transfer_status(&self, transfer_id: &str)
    -> Result<TransferStatus, MonitorError>;

    async fn cancel_transfer(&self, transfer_id: &str) -> Result<(), MonitorError>;
}

/// Flags a dataset as ready once its data has arrived
#[async_trait]
pub trait DataReadyMarker: Send + Sync {
    async fn mark_data_ready(&self, dataset_id: &DatasetId, token: &str)
    -> Result<(), MonitorError>;
}
