//! Catalog Adapter
//!
//! REST client for the catalog job API (`/api/v4/jobs`) and the dataset
//! lifecycle endpoint used to mark data ready. Authenticates as a service
//! user and caches the resulting token.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::credentials::{AccessToken, TokenCache};
use super::{DataReadyMarker, JobRecordClient};
use crate::monitor::error::MonitorError;
use crate::monitor::types::{
    DatasetId, DatasetRef, JobFilter, JobId, JobParams, JobRecord, JobResult, TRANSFER_JOB_TYPE,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Service-user tokens without an explicit lifetime are kept this long
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobBody<'a> {
    #[serde(rename = "type")]
    job_type: &'a str,
    owner_group: &'a str,
    job_params: JobParams,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateJobBody<'a> {
    status_code: &'a str,
    status_message: &'a str,
    job_result_object: &'a JobResult,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CatalogErrorBody {
    #[serde(alias = "Message")]
    message: String,
}

/// HTTP client for the catalog backend
pub struct HttpCatalogClient {
    base_url: Url,
    username: String,
    password: String,
    client: reqwest::Client,
    token: TokenCache,
}

impl HttpCatalogClient {
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, MonitorError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MonitorError::ConfigError(format!("invalid catalog url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MonitorError::ConfigError(format!(
                "catalog url '{}' cannot be used as a base",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                MonitorError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url,
            username: username.into(),
            password: password.into(),
            client,
            token: TokenCache::new("catalog"),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn login(&self) -> Result<AccessToken, MonitorError> {
        let url = self.endpoint(&["api", "v3", "auth", "login"]);
        let response = self
            .client
            .post(url)
            .json(&LoginBody {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| MonitorError::CredentialRefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::CredentialRefreshFailed(format!(
                "service user login returned '{}', body: '{}'",
                status, body
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::CredentialRefreshFailed(e.to_string()))?;
        Ok(AccessToken::new(
            login.access_token,
            login.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        ))
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, MonitorError> {
        let token = self.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    /// Send a request and return status + body text
    async fn execute(&self, request: RequestBuilder) -> Result<(u16, String), MonitorError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if status == 401 {
            self.token.invalidate().await;
        }
        Ok((status, body))
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<CatalogErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_default()
}

/// Map a failed create response
fn classify_create_failure(status: u16, body: &str) -> MonitorError {
    match status {
        401 => MonitorError::CatalogError("authentication failed: user is not logged in".into()),
        _ => MonitorError::CatalogError(format!(
            "unknown error occurred with status: '{}', body: '{}'",
            status, body
        )),
    }
}

/// Map a failed update response
fn classify_update_failure(status: u16, body: &str) -> MonitorError {
    match status {
        403 => MonitorError::CatalogError("cannot patch job: forbidden".into()),
        400 => MonitorError::CatalogError("cannot patch job: invalid job id".into()),
        _ => MonitorError::CatalogError(format!(
            "unknown status encountered: '{}', body: '{}'",
            status, body
        )),
    }
}

/// Map a failed delete response; a 400 naming a missing job means "absent"
fn classify_delete_failure(job_id: &str, status: u16, body: &str) -> MonitorError {
    if status == 400 {
        let message = error_message(body);
        if message.contains("doesn't exist") || message.contains("does not exist") {
            return MonitorError::JobRecordAbsent(job_id.to_string());
        }
        return MonitorError::CatalogError(format!("status 400 - '{}'", message));
    }
    MonitorError::CatalogError(format!(
        "couldn't delete job, unknown status - status code: {}",
        status
    ))
}

fn classify_get_failure(job_id: &str, status: u16, body: &str) -> MonitorError {
    match status {
        404 => MonitorError::JobRecordNotFound(job_id.to_string()),
        400 if error_message(body).contains("exist") => {
            MonitorError::JobRecordNotFound(job_id.to_string())
        }
        _ => MonitorError::CatalogError(format!(
            "couldn't fetch job '{}', status: {}, body: '{}'",
            job_id, status, body
        )),
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, MonitorError> {
    serde_json::from_str(body)
        .map_err(|e| MonitorError::CatalogError(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl JobRecordClient for HttpCatalogClient {
    async fn create_job(
        &self,
        owner_group: &str,
        dataset_id: &str,
    ) -> Result<JobId, MonitorError> {
        let url = self.endpoint(&["api", "v4", "jobs"]);
        let body = CreateJobBody {
            job_type: TRANSFER_JOB_TYPE,
            owner_group,
            job_params: JobParams {
                dataset_list: vec![DatasetRef {
                    pid: dataset_id.to_string(),
                    files: Vec::new(),
                }],
            },
        };
        debug!(url = %url, dataset_id = dataset_id, "Creating transfer job in catalog");

        let (status, text) = self
            .execute(self.authorized(Method::POST, url).await?.json(&body))
            .await?;
        if status != 201 {
            return Err(classify_create_failure(status, &text));
        }
        let record: JobRecord = parse_body(&text)?;
        Ok(record.id)
    }

    async fn update_job(
        &self,
        job_id: &str,
        status_code: &str,
        status_message: &str,
        progress: &JobResult,
    ) -> Result<(), MonitorError> {
        let url = self.endpoint(&["api", "v4", "jobs", job_id]);
        let body = UpdateJobBody {
            status_code,
            status_message,
            job_result_object: progress,
        };

        let (status, text) = self
            .execute(self.authorized(Method::PATCH, url).await?.json(&body))
            .await?;
        if status != 200 {
            return Err(classify_update_failure(status, &text));
        }
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), MonitorError> {
        let url = self.endpoint(&["api", "v4", "jobs", job_id]);
        let (status, text) = self.execute(self.authorized(Method::DELETE, url).await?).await?;
        if status != 200 {
            return Err(classify_delete_failure(job_id, status, &text));
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<JobRecord, MonitorError> {
        let url = self.endpoint(&["api", "v4", "jobs", job_id]);
        let (status, text) = self.execute(self.authorized(Method::GET, url).await?).await?;
        if status != 200 {
            return Err(classify_get_failure(job_id, status, &text));
        }
        parse_body(&text)
    }

    async fn list_incomplete_jobs(
        &self,
        filter: &JobFilter,
    ) -> Result<Vec<JobRecord>, MonitorError> {
        let mut url = self.endpoint(&["api", "v4", "jobs"]);
        url.query_pairs_mut()
            .append_pair("filter", &filter.to_query());

        let (status, text) = self.execute(self.authorized(Method::GET, url).await?).await?;
        if status != 200 {
            return Err(MonitorError::CatalogError(format!(
                "listing jobs failed with status: {}, body: '{}'",
                status, text
            )));
        }
        parse_body(&text)
    }

    async fn access_token(&self) -> Result<String, MonitorError> {
        self.token.get_or_refresh(|| self.login()).await
    }
}

#[async_trait]
impl DataReadyMarker for HttpCatalogClient {
    async fn mark_data_ready(
        &self,
        dataset_id: &DatasetId,
        token: &str,
    ) -> Result<(), MonitorError> {
        let url = self.endpoint(&["api", "v3", "datasets", dataset_id.as_str()]);
        let body = json!({
            "datasetlifecycle": {
                "archivable": true,
                "archiveStatusMessage": "datasetCreated",
            }
        });

        let response = self
            .client
            .patch(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| MonitorError::MarkReadyFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(dataset_id = %dataset_id, status = %status, "Marking dataset ready rejected");
            return Err(MonitorError::MarkReadyFailed(format!(
                "status: '{}', body: '{}'",
                status, text
            )));
        }
        Ok(())
    }
}
