//! Transport abstraction for tool endpoints.
//!
//! The dispatcher speaks to tools through this trait so fault injection in
//! tests needs no network. The production implementation is a thin reqwest
//! wrapper; all timeout enforcement lives in the dispatcher, not here.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A failure below the tool-semantics level.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection/request-level failure — the transient class.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("endpoint rejected request: status {status}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// POST a JSON payload and return the parsed JSON response body.
    async fn post(&self, url: &str, payload: &Value) -> Result<Value, TransportError>;
}

/// reqwest-backed transport for real tool endpoints.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        // No client-level timeout: the dispatcher applies the per-call
        // timeout from the guardrail policy around every attempt.
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn post(&self, url: &str, payload: &Value) -> Result<Value, TransportError> {
        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            body.truncate(500);
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| TransportError::Network(format!("invalid JSON body: {e}")))
    }
}
