//! Transfer Monitor
//!
//! Watches external file transfers and keeps catalog job records in sync with
//! their progress. Incomplete jobs are resumed after a restart.
//!
//! # Modules
//!
//! - [`config`] - YAML configuration and environment secrets
//! - [`logging`] - tracing subscriber setup
//! - [`monitor`] - task pool, monitoring tasks, recovery and service adapters

pub mod config;
pub mod logging;
pub mod monitor;

// Convenient re-exports at crate root
pub use config::{AppConfig, ConfigError, LogConfig, Secrets, TaskConfig};
pub use monitor::{
    JobStatus, MonitorError, PoolConfig, RecoveryReport, StatusCode, TaskPool, TransferRequest,
    TransferSubmitter, recover,
};
