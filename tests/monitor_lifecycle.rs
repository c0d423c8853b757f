//! End-to-end lifecycle through the public API, with in-memory fakes for the
//! catalog and the transfer backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use transfer_monitor::monitor::adapters::{DataReadyMarker, JobRecordClient, TransferClient};
use transfer_monitor::monitor::types::{
    DatasetId, FileEntry, JobFilter, JobId, JobRecord, JobResult, TransferEndpoints, TransferId,
    TransferState, TransferStatus,
};
use transfer_monitor::{
    JobStatus, MonitorError, PoolConfig, TaskPool, TransferRequest, TransferSubmitter, recover,
};

#[derive(Default)]
struct InMemoryCatalog {
    /// job_id -> (status_code, result)
    records: Mutex<HashMap<String, (String, JobResult)>>,
    ready: Mutex<Vec<String>>,
}

impl InMemoryCatalog {
    fn status_code(&self, job_id: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(job_id)
            .map(|(code, _)| code.clone())
    }

    fn result(&self, job_id: &str) -> Option<JobResult> {
        self.records
            .lock()
            .unwrap()
            .get(job_id)
            .map(|(_, result)| result.clone())
    }
}

#[async_trait]
impl JobRecordClient for InMemoryCatalog {
    async fn create_job(
        &self,
        _owner_group: &str,
        _dataset_id: &str,
    ) -> Result<JobId, MonitorError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.records
            .lock()
            .unwrap()
            .insert(id.clone(), (String::new(), JobResult::default()));
        Ok(id)
    }

    async fn update_job(
        &self,
        job_id: &str,
        status_code: &str,
        _status_message: &str,
        progress: &JobResult,
    ) -> Result<(), MonitorError> {
        match self.records.lock().unwrap().get_mut(job_id) {
            Some(record) => {
                *record = (status_code.to_string(), progress.clone());
                Ok(())
            }
            None => Err(MonitorError::JobRecordNotFound(job_id.to_string())),
        }
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), MonitorError> {
        self.records
            .lock()
            .unwrap()
            .remove(job_id)
            .map(|_| ())
            .ok_or_else(|| MonitorError::JobRecordAbsent(job_id.to_string()))
    }

    async fn get_job(&self, job_id: &str) -> Result<JobRecord, MonitorError> {
        Err(MonitorError::JobRecordNotFound(job_id.to_string()))
    }

    async fn list_incomplete_jobs(
        &self,
        _filter: &JobFilter,
    ) -> Result<Vec<JobRecord>, MonitorError> {
        Ok(Vec::new())
    }

    async fn access_token(&self) -> Result<String, MonitorError> {
        Ok("token".to_string())
    }
}

#[async_trait]
impl DataReadyMarker for InMemoryCatalog {
    async fn mark_data_ready(
        &self,
        dataset_id: &DatasetId,
        _token: &str,
    ) -> Result<(), MonitorError> {
        self.ready.lock().unwrap().push(dataset_id.clone());
        Ok(())
    }
}

/// Transfers stay ACTIVE until `complete` is called
#[derive(Default)]
struct FakeTransfers {
    states: Mutex<HashMap<String, TransferState>>,
    files: Mutex<HashMap<String, usize>>,
}

impl FakeTransfers {
    fn complete(&self, transfer_id: &str) {
        self.states
            .lock()
            .unwrap()
            .insert(transfer_id.to_string(), TransferState::Succeeded);
    }

    fn only_transfer(&self) -> String {
        self.states.lock().unwrap().keys().next().cloned().unwrap()
    }

    fn start(&self, file_count: usize) -> TransferId {
        let id = uuid::Uuid::new_v4().to_string();
        self.states
            .lock()
            .unwrap()
            .insert(id.clone(), TransferState::Active);
        self.files.lock().unwrap().insert(id.clone(), file_count);
        id
    }
}

#[async_trait]
impl TransferClient for FakeTransfers {
    async fn submit_file_list(
        &self,
        _endpoints: &TransferEndpoints,
        files: &[FileEntry],
    ) -> Result<TransferId, MonitorError> {
        Ok(self.start(files.len()))
    }

    async fn submit_folder_sync(
        &self,
        _endpoints: &TransferEndpoints,
    ) -> Result<TransferId, MonitorError> {
        Ok(self.start(1))
    }

    async fn get_transfer_status(&self, transfer_id: &str) -> Result<TransferStatus, MonitorError> {
        let state = self
            .states
            .lock()
            .unwrap()
            .get(transfer_id)
            .cloned()
            .ok_or_else(|| {
                MonitorError::PollingFailed(transfer_id.to_string(), "unknown".into())
            })?;
        let total = *self.files.lock().unwrap().get(transfer_id).unwrap_or(&0) as u64;
        let mut status = TransferStatus::new(state.clone());
        status.files_total = total;
        if state == TransferState::Succeeded {
            status.files_transferred = total;
            status.bytes_transferred = total * 512;
        }
        Ok(status)
    }

    async fn cancel_transfer(&self, transfer_id: &str) -> Result<(), MonitorError> {
        self.states.lock().unwrap().remove(transfer_id);
        Ok(())
    }
}

fn setup(queue_capacity: usize) -> (TransferSubmitter, Arc<InMemoryCatalog>, Arc<FakeTransfers>) {
    let catalog = Arc::new(InMemoryCatalog::default());
    let transfers = Arc::new(FakeTransfers::default());
    let pool = TaskPool::new(
        PoolConfig {
            max_concurrency: 1,
            queue_capacity,
            poll_interval: Duration::from_millis(5),
            poll_error_retries: 0,
        },
        catalog.clone(),
        transfers.clone(),
        catalog.clone(),
    );
    let facilities = HashMap::from([
        ("SRC".to_string(), "collection-src".to_string()),
        ("DST".to_string(), "collection-dst".to_string()),
    ]);
    (
        TransferSubmitter::new(pool, transfers.clone(), facilities),
        catalog,
        transfers,
    )
}

fn request(files: Option<Vec<FileEntry>>) -> TransferRequest {
    TransferRequest {
        dataset_id: "20.500.11935/abc".to_string(),
        owner_group: "ingestors".to_string(),
        source_facility: "SRC".to_string(),
        dest_facility: "DST".to_string(),
        source_path: "/data/abc".to_string(),
        dest_path: "/archive/abc".to_string(),
        files,
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_submitted_transfer_runs_to_completion() {
    let (submitter, catalog, transfers) = setup(0);
    let files = vec![
        FileEntry {
            path: "a.h5".into(),
            is_symlink: false,
        },
        FileEntry {
            path: "b.h5".into(),
            is_symlink: false,
        },
    ];

    let job_id = submitter.submit(&request(Some(files))).await.unwrap();
    wait_until(|| catalog.status_code(&job_id).as_deref() == Some("002")).await;

    transfers.complete(&transfers.only_transfer());
    wait_until(|| !submitter.pool().is_registered(&job_id)).await;

    assert_eq!(catalog.status_code(&job_id).as_deref(), Some("003"));
    let result = catalog.result(&job_id).unwrap();
    assert_eq!(result.status, JobStatus::Finished);
    assert_eq!(result.files_transferred, 2);
    assert_eq!(result.bytes_transferred, 1024);
    assert!(result.completed);
    assert_eq!(
        *catalog.ready.lock().unwrap(),
        vec!["20.500.11935/abc".to_string()]
    );
}

#[tokio::test]
async fn test_delete_running_job() {
    let (submitter, catalog, _transfers) = setup(0);

    let job_id = submitter.submit(&request(None)).await.unwrap();
    submitter.pool().delete(&job_id).await.unwrap();
    wait_until(|| !submitter.pool().is_registered(&job_id)).await;

    let err = submitter.pool().delete(&job_id).await.unwrap_err();
    assert!(err.is_absent());
    assert!(catalog.ready.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bounded_queue_rejects_then_recovers() {
    let (submitter, _catalog, transfers) = setup(1);

    let first = submitter.submit(&request(None)).await.unwrap();
    wait_until(|| submitter.pool().waiting() == 0).await;
    let second = submitter.submit(&request(None)).await.unwrap();

    let err = submitter.submit(&request(None)).await.unwrap_err();
    assert!(matches!(err, MonitorError::QueueFull));
    assert_eq!(err.http_status(), 503);
    assert_eq!(transfers.states.lock().unwrap().len(), 2);

    submitter.pool().cancel(&first).unwrap();
    wait_until(|| submitter.pool().can_admit()).await;
    assert!(submitter.pool().is_registered(&second));
    submitter.pool().cancel(&second).unwrap();
}

#[tokio::test]
async fn test_recover_with_empty_catalog() {
    let (submitter, _catalog, _transfers) = setup(0);
    let report = recover(submitter.pool()).await.unwrap();
    assert!(report.resumed.is_empty());
    assert!(report.skipped.is_empty());
}
