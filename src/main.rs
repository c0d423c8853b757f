//! Transfer Monitor service
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Clients  │───▶│ TaskPool │───▶│ Recovery │──▶ run until Ctrl-C
//! │  (YAML)  │    │  (HTTP)  │    │          │    │          │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! The `TransferSubmitter` built here is the admission front door for new
//! transfers, resolving facility names from the `facilities` config section.
//!
//! Usage: `transfer_monitor [--config <path>]`

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use transfer_monitor::config::{AppConfig, Secrets};
use transfer_monitor::logging::init_logging;
use transfer_monitor::monitor::adapters::{HttpCatalogClient, HttpTransferClient};
use transfer_monitor::monitor::{TaskPool, TransferSubmitter, recover};

const DEFAULT_CONFIG_PATH: &str = "config/dev.yaml";

fn get_config_path() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = get_config_path();
    let app_config = AppConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config file: {}", config_path))?;
    let _log_guard = init_logging(&app_config.logging);

    info!(
        version = env!("MONITOR_BUILD_VERSION"),
        config = %config_path,
        "Starting transfer monitor"
    );

    let secrets = Secrets::from_env().context("Failed to read service credentials")?;

    let catalog = Arc::new(
        HttpCatalogClient::new(
            &app_config.catalog.url,
            secrets.catalog_username,
            secrets.catalog_password,
        )
        .context("Failed to create catalog client")?,
    );
    let transfers = Arc::new(
        HttpTransferClient::new(
            &app_config.transfer.api_url,
            &app_config.transfer.auth_url,
            secrets.transfer_client_id,
            secrets.transfer_client_secret,
            app_config.transfer.scopes.clone(),
        )
        .context("Failed to create transfer client")?,
    );

    let pool = TaskPool::new(
        app_config.task.pool_config(),
        catalog.clone(),
        transfers.clone(),
        catalog,
    );
    let facilities = app_config.facilities.clone();
    if facilities.is_empty() {
        warn!("No facilities configured, every new transfer will be rejected");
    }
    let submitter = TransferSubmitter::new(pool, transfers, facilities);

    let report = match recover(submitter.pool()).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Failed to restore incomplete transfer jobs");
            return Err(e).context("Recovery failed");
        }
    };
    info!(
        resumed = report.resumed.len(),
        skipped = report.skipped.len(),
        active = submitter.pool().active_jobs(),
        facilities = app_config.facilities.len(),
        "Transfer monitor ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!(
        active = submitter.pool().active_jobs(),
        "Shutdown requested, stopping"
    );
    Ok(())
}
