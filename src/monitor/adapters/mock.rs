//! Mock adapters for testing
//!
//! Record every call so tests can assert on the exact sequence of job-record
//! writes, polls, cancels and mark-ready calls.

use super::*;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::monitor::types::TransferState;

/// One `update_job` call as seen by the catalog
#[derive(Debug, Clone)]
pub struct RecordedUpdate {
    pub job_id: String,
    pub status_code: String,
    pub status_message: String,
    pub result: JobResult,
}

pub struct MockJobRecordClient {
    updates: Mutex<Vec<RecordedUpdate>>,
    created: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
    incomplete: Mutex<Vec<JobRecord>>,
    next_id: AtomicUsize,
    fail_updates: Mutex<bool>,
    fail_create: Mutex<bool>,
    fail_list: Mutex<bool>,
    fail_token: Mutex<bool>,
    delete_error: Mutex<Option<MonitorError>>,
}

impl MockJobRecordClient {
    pub fn new() -> Self {
        Self {
            updates: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            incomplete: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            fail_updates: Mutex::new(false),
            fail_create: Mutex::new(false),
            fail_list: Mutex::new(false),
            fail_token: Mutex::new(false),
            delete_error: Mutex::new(None),
        }
    }

    pub fn set_incomplete(&self, records: Vec<JobRecord>) {
        *self.incomplete.lock().unwrap() = records;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn set_fail_list(&self, fail: bool) {
        *self.fail_list.lock().unwrap() = fail;
    }

    pub fn set_fail_token(&self, fail: bool) {
        *self.fail_token.lock().unwrap() = fail;
    }

    pub fn set_delete_error(&self, err: Option<MonitorError>) {
        *self.delete_error.lock().unwrap() = err;
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updates_for(&self, job_id: &str) -> Vec<RecordedUpdate> {
        self.updates()
            .into_iter()
            .filter(|u| u.job_id == job_id)
            .collect()
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRecordClient for MockJobRecordClient {
    async fn create_job(
        &self,
        owner_group: &str,
        dataset_id: &str,
    ) -> Result<JobId, MonitorError> {
        if *self.fail_create.lock().unwrap() {
            return Err(MonitorError::CatalogError("Mock create failure".into()));
        }
        self.created
            .lock()
            .unwrap()
            .push((owner_group.to_string(), dataset_id.to_string()));
        Ok(format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn update_job(
        &self,
        job_id: &str,
        status_code: &str,
        status_message: &str,
        progress: &JobResult,
    ) -> Result<(), MonitorError> {
        self.updates.lock().unwrap().push(RecordedUpdate {
            job_id: job_id.to_string(),
            status_code: status_code.to_string(),
            status_message: status_message.to_string(),
            result: progress.clone(),
        });
        if *self.fail_updates.lock().unwrap() {
            return Err(MonitorError::CatalogError("Mock update failure".into()));
        }
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), MonitorError> {
        if let Some(err) = self.delete_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.deleted.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<JobRecord, MonitorError> {
        self.incomplete
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == job_id)
            .cloned()
            .ok_or_else(|| MonitorError::JobRecordNotFound(job_id.to_string()))
    }

    async fn list_incomplete_jobs(
        &self,
        _filter: &JobFilter,
    ) -> Result<Vec<JobRecord>, MonitorError> {
        if *self.fail_list.lock().unwrap() {
            return Err(MonitorError::CatalogError("Mock list failure".into()));
        }
        Ok(self.incomplete.lock().unwrap().clone())
    }

    async fn access_token(&self) -> Result<String, MonitorError> {
        if *self.fail_token.lock().unwrap() {
            return Err(MonitorError::CredentialRefreshFailed("Mock login failure".into()));
        }
        Ok("mock-token".to_string())
    }
}

/// Scripted transfer backend
///
/// Each transfer ID has a queue of poll responses; the last one repeats.
/// Unscripted transfers report ACTIVE forever.
pub struct MockTransferClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<TransferStatus, MonitorError>>>>,
    polls: Mutex<HashMap<String, usize>>,
    cancelled: Mutex<Vec<String>>,
    submitted: Mutex<Vec<TransferEndpoints>>,
    next_id: AtomicUsize,
    fail_cancel: Mutex<bool>,
    fail_submit: Mutex<bool>,
}

impl MockTransferClient {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
            cancelled: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            fail_cancel: Mutex::new(false),
            fail_submit: Mutex::new(false),
        }
    }

    pub fn script(&self, transfer_id: &str, responses: Vec<Result<TransferStatus, MonitorError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(transfer_id.to_string(), responses.into());
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        *self.fail_cancel.lock().unwrap() = fail;
    }

    pub fn set_fail_submit(&self, fail: bool) {
        *self.fail_submit.lock().unwrap() = fail;
    }

    pub fn poll_count(&self, transfer_id: &str) -> usize {
        *self.polls.lock().unwrap().get(transfer_id).unwrap_or(&0)
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<TransferEndpoints> {
        self.submitted.lock().unwrap().clone()
    }

    fn next_transfer_id(&self, endpoints: &TransferEndpoints) -> Result<TransferId, MonitorError> {
        if *self.fail_submit.lock().unwrap() {
            return Err(MonitorError::TransferSubmissionFailed(
                "Mock submit failure".into(),
            ));
        }
        self.submitted.lock().unwrap().push(endpoints.clone());
        Ok(format!(
            "transfer-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        ))
    }
}

#[async_trait]
impl TransferClient for MockTransferClient {
    async fn submit_file_list(
        &self,
        endpoints: &TransferEndpoints,
        _files: &[FileEntry],
    ) -> Result<TransferId, MonitorError> {
        self.next_transfer_id(endpoints)
    }

    async fn submit_folder_sync(
        &self,
        endpoints: &TransferEndpoints,
    ) -> Result<TransferId, MonitorError> {
        self.next_transfer_id(endpoints)
    }

    async fn get_transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<TransferStatus, MonitorError> {
        *self
            .polls
            .lock()
            .unwrap()
            .entry(transfer_id.to_string())
            .or_default() += 1;

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(transfer_id) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Ok(TransferStatus::new(TransferState::Active))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(TransferStatus::new(TransferState::Active))),
            None => Ok(TransferStatus::new(TransferState::Active)),
        }
    }

    async fn cancel_transfer(&self, transfer_id: &str) -> Result<(), MonitorError> {
        self.cancelled.lock().unwrap().push(transfer_id.to_string());
        if *self.fail_cancel.lock().unwrap() {
            return Err(MonitorError::TransferCancelFailed(
                transfer_id.to_string(),
                "Mock cancel failure".into(),
            ));
        }
        Ok(())
    }
}

pub struct MockMarker {
    calls: Mutex<Vec<(String, String)>>,
    fail: Mutex<bool>,
}

impl MockMarker {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataReadyMarker for MockMarker {
    async fn mark_data_ready(
        &self,
        dataset_id: &DatasetId,
        token: &str,
    ) -> Result<(), MonitorError> {
        self.calls
            .lock()
            .unwrap()
            .push((dataset_id.clone(), token.to_string()));
        if *self.fail.lock().unwrap() {
            return Err(MonitorError::MarkReadyFailed("Mock mark failure".into()));
        }
        Ok(())
    }
}

/// Status helper for scripts
pub fn status(
    state: TransferState,
    bytes: u64,
    files_transferred: u64,
    files_total: u64,
) -> Result<TransferStatus, MonitorError> {
    let mut status = TransferStatus::new(state);
    status.bytes_transferred = bytes;
    status.files_transferred = files_transferred;
    status.files_total = files_total;
    Ok(status)
}

/// Record for recovery tests
pub fn job_record(id: &str, transfer_id: &str, datasets: &[&str]) -> JobRecord {
    let mut record = JobRecord {
        id: id.to_string(),
        owner_group: "group".to_string(),
        ..Default::default()
    };
    record.job_result_object.transfer_id = transfer_id.to_string();
    record.job_params.dataset_list = datasets
        .iter()
        .map(|pid| crate::monitor::types::DatasetRef {
            pid: pid.to_string(),
            files: Vec::new(),
        })
        .collect();
    record
}
