use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::monitor::PoolConfig;

pub const CATALOG_USERNAME_ENV: &str = "CATALOG_SERVICE_USER_USERNAME";
pub const CATALOG_PASSWORD_ENV: &str = "CATALOG_SERVICE_USER_PASSWORD";
pub const TRANSFER_CLIENT_ID_ENV: &str = "TRANSFER_CLIENT_ID";
pub const TRANSFER_CLIENT_SECRET_ENV: &str = "TRANSFER_CLIENT_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config yaml: {0}")]
    Parse(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LogConfig,
    pub catalog: CatalogConfig,
    pub transfer: TransferConfig,
    /// Facility name -> transfer collection ID
    #[serde(default)]
    pub facilities: HashMap<String, String>,
    #[serde(default)]
    pub task: TaskConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// hourly | daily | never
    pub rotation: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "transfer_monitor.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    pub api_url: String,
    pub auth_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TaskConfig {
    pub max_concurrency: usize,
    /// Max jobs waiting for a worker slot, 0 = unbounded
    pub queue_size: usize,
    pub poll_interval_secs: u64,
    pub poll_error_retries: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            queue_size: 0,
            poll_interval_secs: 10,
            poll_error_retries: 0,
        }
    }
}

impl TaskConfig {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_concurrency: self.max_concurrency,
            queue_capacity: self.queue_size,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_error_retries: self.poll_error_retries,
        }
    }
}

/// Service credentials, never stored in the config file
#[derive(Clone)]
pub struct Secrets {
    pub catalog_username: String,
    pub catalog_password: String,
    pub transfer_client_id: String,
    pub transfer_client_secret: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("catalog_username", &self.catalog_username)
            .field("transfer_client_id", &self.transfer_client_id)
            .finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve secrets through `lookup`; empty values count as missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };
        Ok(Self {
            catalog_username: get(CATALOG_USERNAME_ENV)?,
            catalog_password: get(CATALOG_PASSWORD_ENV)?,
            transfer_client_id: get(TRANSFER_CLIENT_ID_ENV)?,
            transfer_client_secret: get(TRANSFER_CLIENT_SECRET_ENV)?,
        })
    }
}

impl AppConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
