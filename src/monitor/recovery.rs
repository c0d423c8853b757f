//! Start-up Recovery
//!
//! Re-admits transfer jobs left incomplete by a previous run. Runs once,
//! before new submissions are accepted. Resumed tasks simply poll the
//! external transfer again; polling carries no state from the previous run.

use tracing::{debug, info, warn};

use super::error::MonitorError;
use super::pool::TaskPool;
use super::types::{JobFilter, JobRecord};

/// Outcome of one recovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub resumed: Vec<String>,
    pub skipped: Vec<String>,
}

/// Why a record cannot be resumed
fn skip_reason(record: &JobRecord) -> Option<&'static str> {
    if record.transfer_id().is_none() {
        return Some("job has no transfer id, so it cannot be resumed");
    }
    match record.job_params.dataset_list.len() {
        0 => Some("job has no datasets associated, so it cannot be resumed"),
        1 => None,
        _ => Some("job has more than one associated dataset, which is not supported"),
    }
}

/// Enumerate incomplete job records and resubmit each resumable one.
///
/// A failure to list the records is returned to the caller, which treats it
/// as fatal to start-up.
pub async fn recover(pool: &TaskPool) -> Result<RecoveryReport, MonitorError> {
    let records = pool
        .job_records()
        .list_incomplete_jobs(&JobFilter::incomplete())
        .await?;

    if records.is_empty() {
        debug!("No incomplete transfer jobs found");
        return Ok(RecoveryReport::default());
    }
    info!(count = records.len(), "Found incomplete transfer jobs to resume");

    let mut report = RecoveryReport::default();
    for record in records {
        if let Some(reason) = skip_reason(&record) {
            warn!(
                job_id = %record.id,
                dataset_count = record.job_params.dataset_list.len(),
                "{}", reason
            );
            report.skipped.push(record.id);
            continue;
        }

        let transfer_id = record.transfer_id().unwrap_or_default();
        let dataset_id = &record.job_params.dataset_list[0].pid;
        match pool.submit(transfer_id, dataset_id, &record.id) {
            Ok(_) => report.resumed.push(record.id),
            Err(e) => {
                warn!(job_id = %record.id, error = %e, "Job could not be resumed");
                report.skipped.push(record.id);
            }
        }
    }

    info!(
        resumed = report.resumed.len(),
        skipped = report.skipped.len(),
        "Recovery finished"
    );
    Ok(report)
}
