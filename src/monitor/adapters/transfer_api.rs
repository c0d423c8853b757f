//! Transfer Backend Adapter
//!
//! REST client for the transfer service: submission (file list or folder
//! sync), task status polling and cancellation. Authenticates with an OAuth2
//! client-credentials grant.

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::TransferClient;
use super::credentials::{AccessToken, TokenCache};
use crate::monitor::error::MonitorError;
use crate::monitor::types::{
    FileEntry, TransferEndpoints, TransferId, TransferState, TransferStatus,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Folder syncs only copy files whose modification time differs
const FOLDER_SYNC_LEVEL: &str = "mtime";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct SubmissionIdResponse {
    value: String,
}

#[derive(Serialize, Debug, PartialEq)]
struct TransferItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    source_path: String,
    destination_path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    recursive: bool,
}

#[derive(Serialize, Debug)]
struct TransferDocument {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    submission_id: String,
    source_endpoint: String,
    destination_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_level: Option<&'static str>,
    #[serde(rename = "DATA")]
    data: Vec<TransferItem>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FatalError {
    code: String,
    description: String,
}

#[derive(Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    bytes_transferred: u64,
    #[serde(default)]
    files: u64,
    #[serde(default)]
    files_transferred: u64,
    #[serde(default)]
    files_skipped: Option<u64>,
    #[serde(default)]
    fatal_error: Option<FatalError>,
}

/// HTTP client for the transfer backend
pub struct HttpTransferClient {
    api_url: Url,
    auth_url: Url,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    client: reqwest::Client,
    token: TokenCache,
}

impl HttpTransferClient {
    pub fn new(
        api_url: &str,
        auth_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
    ) -> Result<Self, MonitorError> {
        let parse = |raw: &str, what: &str| {
            Url::parse(raw)
                .map_err(|e| MonitorError::ConfigError(format!("invalid {} url: {}", what, e)))
        };
        let api_url = parse(api_url, "transfer api")?;
        let auth_url = parse(auth_url, "transfer auth")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                MonitorError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_url,
            auth_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
            client,
            token: TokenCache::new("transfer"),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn client_credentials(&self) -> Result<AccessToken, MonitorError> {
        let scope = self.scopes.join(" ");
        let response = self
            .client
            .post(self.auth_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", scope.as_str())])
            .send()
            .await
            .map_err(|e| MonitorError::CredentialRefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::CredentialRefreshFailed(format!(
                "client credentials grant returned '{}', body: '{}'",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::CredentialRefreshFailed(e.to_string()))?;
        Ok(AccessToken::new(
            token.access_token,
            token.expires_in.unwrap_or(3600),
        ))
    }

    /// Authorized JSON call; errors are plain strings for the caller to wrap
    async fn call<R>(
        &self,
        method: Method,
        url: Url,
        body: Option<&TransferDocument>,
    ) -> Result<R, String>
    where
        R: for<'de> Deserialize<'de>,
    {
        let token = self
            .token
            .get_or_refresh(|| self.client_credentials())
            .await
            .map_err(|e| e.to_string())?;

        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.token.invalidate().await;
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("status: '{}', body: '{}'", status, text));
        }
        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))
    }

    async fn submit(&self, document: TransferDocument) -> Result<TransferId, MonitorError> {
        let url = self.endpoint(&["transfer"]);
        debug!(
            source = %document.source_endpoint,
            destination = %document.destination_endpoint,
            items = document.data.len(),
            "Submitting transfer"
        );
        let response: SubmitResponse = self
            .call(Method::POST, url, Some(&document))
            .await
            .map_err(MonitorError::TransferSubmissionFailed)?;
        Ok(response.task_id)
    }

    async fn submission_id(&self) -> Result<String, MonitorError> {
        let url = self.endpoint(&["submission_id"]);
        let response: SubmissionIdResponse = self
            .call(Method::GET, url, None)
            .await
            .map_err(MonitorError::TransferSubmissionFailed)?;
        Ok(response.value)
    }
}

fn join_path(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

fn file_list_items(endpoints: &TransferEndpoints, files: &[FileEntry]) -> Vec<TransferItem> {
    files
        .iter()
        .map(|file| TransferItem {
            data_type: if file.is_symlink {
                "transfer_symlink_item"
            } else {
                "transfer_item"
            },
            source_path: join_path(&endpoints.src_path, &file.path),
            destination_path: join_path(&endpoints.dst_path, &file.path),
            recursive: false,
        })
        .collect()
}

fn to_transfer_status(task_id: &str, task: TaskResponse) -> Result<TransferStatus, MonitorError> {
    let state = match task.status.as_str() {
        "ACTIVE" => TransferState::Active,
        "INACTIVE" => TransferState::Inactive,
        "SUCCEEDED" => TransferState::Succeeded,
        "FAILED" => TransferState::Failed,
        other => {
            return Err(MonitorError::PollingFailed(
                task_id.to_string(),
                format!("unknown task status: {}", other),
            ));
        }
    };
    let (failure_code, failure_description) = match task.fatal_error {
        Some(e) => (Some(e.code), Some(e.description)),
        None => (None, None),
    };
    Ok(TransferStatus {
        state,
        bytes_transferred: task.bytes_transferred,
        files_transferred: task.files_transferred,
        files_total: task.files,
        files_skipped: task.files_skipped,
        failure_code,
        failure_description,
    })
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn submit_file_list(
        &self,
        endpoints: &TransferEndpoints,
        files: &[FileEntry],
    ) -> Result<TransferId, MonitorError> {
        if files.is_empty() {
            return Err(MonitorError::TransferSubmissionFailed(
                "file list is empty".to_string(),
            ));
        }
        let document = TransferDocument {
            data_type: "transfer",
            submission_id: self.submission_id().await?,
            source_endpoint: endpoints.src_collection.clone(),
            destination_endpoint: endpoints.dst_collection.clone(),
            sync_level: None,
            data: file_list_items(endpoints, files),
        };
        self.submit(document).await
    }

    async fn submit_folder_sync(
        &self,
        endpoints: &TransferEndpoints,
    ) -> Result<TransferId, MonitorError> {
        let document = TransferDocument {
            data_type: "transfer",
            submission_id: self.submission_id().await?,
            source_endpoint: endpoints.src_collection.clone(),
            destination_endpoint: endpoints.dst_collection.clone(),
            sync_level: Some(FOLDER_SYNC_LEVEL),
            data: vec![TransferItem {
                data_type: "transfer_item",
                source_path: endpoints.src_path.clone(),
                destination_path: endpoints.dst_path.clone(),
                recursive: true,
            }],
        };
        self.submit(document).await
    }

    async fn get_transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<TransferStatus, MonitorError> {
        let url = self.endpoint(&["task", transfer_id]);
        let task: TaskResponse = self
            .call(Method::GET, url, None)
            .await
            .map_err(|e| MonitorError::PollingFailed(transfer_id.to_string(), e))?;
        to_transfer_status(transfer_id, task)
    }

    async fn cancel_transfer(&self, transfer_id: &str) -> Result<(), MonitorError> {
        let url = self.endpoint(&["task", transfer_id, "cancel"]);
        let _: serde_json::Value = self
            .call(Method::POST, url, None)
            .await
            .map_err(|e| MonitorError::TransferCancelFailed(transfer_id.to_string(), e))?;
        Ok(())
    }
}
