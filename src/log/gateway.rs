//! Submission Gateway Writer
//!
//! Writes go through a submission relay that holds the operator key and
//! forwards messages to the consensus service. The relay contract is:
//!
//! ```text
//! POST {gateway}/submit
//!   {"topic_id": "0.0.6880493", "message": "<base64 payload>"}
//! 200
//!   {"transaction_id": "0.0.6871751@1758538332.951137995", "status": "SUCCESS"}
//! ```
//!
//! Exactly one request per submission. A failed request never produced an
//! entry, so nothing needs cleaning up.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::log::{truncate_body, LogError, LogWriter, SubmitReceipt};

/// Default submission timeout.
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 30;

/// HTTP writer for the submission relay.
#[derive(Debug, Clone)]
pub struct GatewayWriter {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    topic_id: &'a str,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    transaction_id: String,
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "UNKNOWN".to_string()
}

impl GatewayWriter {
    /// Create a writer for the relay at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, LogError> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_SUBMIT_TIMEOUT_SECS))
    }

    /// Create a writer with a per-request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LogError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn submit_url(&self) -> String {
        format!("{}/submit", self.endpoint)
    }
}

#[async_trait]
impl LogWriter for GatewayWriter {
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn submit(&self, log_address: &str, payload: &[u8]) -> Result<SubmitReceipt, LogError> {
        let request = SubmitRequest {
            topic_id: log_address,
            message: BASE64.encode(payload),
        };
        debug!("Submitting to {}", self.submit_url());

        let response = self
            .client
            .post(self.submit_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| LogError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 | 500..=599 => {
                    LogError::Unavailable(format!("HTTP {status}: {}", truncate_body(body)))
                }
                code => LogError::Rejected {
                    status: code,
                    body: truncate_body(body),
                },
            });
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| LogError::InvalidResponse(format!("submit body: {e}")))?;

        Ok(SubmitReceipt {
            transaction_id: body.transaction_id,
            status: body.status,
        })
    }
}
