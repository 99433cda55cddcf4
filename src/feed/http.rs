//! HTTP event source backed by `reqwest`.
//!
//! Talks to two endpoints relative to a base URL:
//! - `GET  /poll/poll`      → `PollResponse` JSON
//! - `POST /poll/subscribe` → response ignored

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};

use super::source::{EventSource, PollError};
use super::types::PollResponse;

pub const DEFAULT_POLL_PATH: &str = "/poll/poll";
pub const DEFAULT_SUBSCRIBE_PATH: &str = "/poll/subscribe";

/// Endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub poll: String,
    pub subscribe: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            poll: DEFAULT_POLL_PATH.to_string(),
            subscribe: DEFAULT_SUBSCRIBE_PATH.to_string(),
        }
    }
}

pub struct HttpEventSource {
    base_url: String,
    endpoints: Endpoints,
    client: reqwest::Client,
}

impl HttpEventSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Endpoints::default(), reqwest::Client::new())
    }

    pub fn with_client(
        base_url: impl Into<String>,
        endpoints: Endpoints,
        client: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            endpoints,
            client,
        }
    }

    /// Builds a source with an optional per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        endpoints: Endpoints,
        timeout: Option<Duration>,
    ) -> Result<Self, PollError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PollError::Network(e.to_string()))?;
        Ok(Self::with_client(base_url, endpoints, client))
    }

    pub fn poll_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.poll)
    }

    pub fn subscribe_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.subscribe)
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn poll(&self) -> Result<PollResponse, PollError> {
        let url = self.poll_url();
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        let status = response.status();
        debug!("Poll response status: {}", status);

        if !status.is_success() {
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Poll endpoint error: {} - {}", status.as_u16(), err_body);
            return Err(PollError::Api {
                status: status.as_u16(),
                message: err_body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        serde_json::from_slice::<PollResponse>(&body).map_err(|e| {
            warn!(
                "Failed to decode poll response: {} (body: {})",
                e,
                String::from_utf8_lossy(&body)
            );
            PollError::Parse(e.to_string())
        })
    }

    async fn subscribe(&self) -> Result<(), PollError> {
        let url = self.subscribe_url();
        info!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        if response.status().is_success() {
            debug!("Subscribe accepted: {}", response.status());
        } else {
            warn!("Subscribe returned {}, ignoring", response.status());
        }
        Ok(())
    }
}
