//! Banned-term oracle: fetches the current banned word list.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OracleError;

/// Path of the banned word endpoint on the language service.
const BANNED_PATH: &str = "/api/banned";

/// Payload returned by the language service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannedWords {
    /// When the list last changed. Informational; older services omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    pub words: Vec<String>,
}

/// Source of the banned word list used for one validation pass.
#[async_trait]
pub trait BannedTermOracle: Send + Sync {
    async fn fetch(&self) -> Result<BannedWords, OracleError>;
}

/// Oracle backed by the remote language service.
pub struct HttpBannedTermOracle {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpBannedTermOracle {
    /// `base_url` is the language service root; `/api/banned` is appended
    /// unless the URL already points at the banned endpoint.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: banned_url(base_url),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn banned_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("banned") {
        base.to_string()
    } else {
        format!("{base}{BANNED_PATH}")
    }
}

#[async_trait]
impl BannedTermOracle for HttpBannedTermOracle {
    async fn fetch(&self) -> Result<BannedWords, OracleError> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout {
                        url: self.url.clone(),
                        timeout: self.timeout,
                    }
                } else {
                    OracleError::RequestFailed {
                        url: self.url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OracleError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let words: BannedWords = resp.json().await.map_err(|e| OracleError::InvalidResponse {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        debug!(url = %self.url, count = words.words.len(), "Fetched banned words");
        Ok(words)
    }
}

/// Fixed word list, for tests and offline runs.
pub struct StaticOracle {
    words: Vec<String>,
}

impl StaticOracle {
    pub fn new<S: Into<String>>(words: impl IntoIterator<Item = S>) -> Self {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl BannedTermOracle for StaticOracle {
    async fn fetch(&self) -> Result<BannedWords, OracleError> {
        Ok(BannedWords {
            updated: Some(Utc::now()),
            words: self.words.clone(),
        })
    }
}
