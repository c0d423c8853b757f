//! Cached access credentials for the catalog and transfer backends.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::debug;

use crate::monitor::error::MonitorError;

/// Tokens are refreshed this long before they expire
const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in_secs: i64) -> Self {
        Self {
            value: value.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

/// Single cached token; concurrent callers share one refresh.
pub struct TokenCache {
    name: &'static str,
    current: Mutex<Option<AccessToken>>,
    refresh_margin: Duration,
}

impl TokenCache {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: Mutex::new(None),
            refresh_margin: Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
        }
    }

    /// Return the cached token, calling `refresh` when missing or stale.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, MonitorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, MonitorError>>,
    {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref()
            && token.is_fresh(Utc::now(), self.refresh_margin)
        {
            return Ok(token.value.clone());
        }

        debug!(credential = self.name, "Refreshing access token");
        let token = refresh().await.map_err(|e| match e {
            MonitorError::CredentialRefreshFailed(_) => e,
            other => MonitorError::CredentialRefreshFailed(other.to_string()),
        })?;
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    /// Drop the cached token, e.g. after the backend rejected it
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }
}
