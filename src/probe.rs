//! Link classification: decides whether an external link points at an image.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::warn;

use crate::error::ProbeError;

/// Outcome of probing one external link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClass {
    Image,
    NonImage,
    /// Probe could not complete. Treated as `NonImage` by the engine.
    Failure(String),
}

impl LinkClass {
    pub fn is_image(&self) -> bool {
        matches!(self, LinkClass::Image)
    }
}

/// Capability to classify a remote link by its content type.
#[async_trait]
pub trait LinkClassifier: Send + Sync {
    async fn classify(&self, url: &str) -> LinkClass;
}

/// Classifier issuing a bounded HEAD request against the link target.
pub struct HttpLinkProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpLinkProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn content_type(&self, url: &str) -> Result<String, ProbeError> {
        let resp = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout {
                        url: url.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    ProbeError::RequestFailed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        resp.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProbeError::MissingContentType {
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl LinkClassifier for HttpLinkProbe {
    async fn classify(&self, url: &str) -> LinkClass {
        match self.content_type(url).await {
            Ok(ct) if ct.trim().to_ascii_lowercase().starts_with("image") => LinkClass::Image,
            Ok(_) => LinkClass::NonImage,
            Err(e) => {
                warn!(url = url, error = %e, "Link probe failed");
                LinkClass::Failure(e.to_string())
            }
        }
    }
}
