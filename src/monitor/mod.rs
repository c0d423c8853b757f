//! Transfer Monitor
//!
//! Watches long-running external file transfers and mirrors their progress
//! into job records held by a catalog service.
//!
//! # Architecture
//!
//! ```text
//! TransferSubmitter ──▶ TaskPool ──▶ MonitoringTask ──poll──▶ TransferClient
//!        │                 │                │
//!        │            cancel/delete         └──write──▶ JobRecordClient
//!        └── create record                  └──mark──▶ DataReadyMarker
//! ```
//!
//! - **TaskPool**: bounded concurrency, optional wait-queue capacity and a
//!   cancellation registry keyed by job ID.
//! - **MonitoringTask**: one per job; polls until the transfer is terminal or
//!   cancellation is requested.
//! - **recover**: re-admits jobs left incomplete by a previous run.
//!
//! # Invariants
//!
//! 1. A job is registered iff its task is queued or running
//! 2. At most `max_concurrency` tasks poll concurrently
//! 3. Recorded progress never decreases
//! 4. Nothing is written after the terminal record, except one mark-ready
//!    downgrade (997) following a successful finish

pub mod adapters;
pub mod error;
pub mod pool;
pub mod recovery;
pub mod state;
pub mod submitter;
pub mod task;
pub mod types;


// Re-exports for convenience
pub use adapters::{DataReadyMarker, JobRecordClient, TransferClient};
pub use error::MonitorError;
pub use pool::{PoolConfig, TaskPool};
pub use recovery::{RecoveryReport, recover};
pub use state::{JobStatus, StatusCode};
pub use submitter::{TransferRequest, TransferSubmitter};
pub use task::{MonitoringTask, TaskContext};
pub use types::{
    FileEntry, JobId, JobProgress, JobRecord, JobResult, TransferEndpoints, TransferJob,
    TransferState, TransferStatus,
};
