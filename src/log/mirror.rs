//! Mirror Node Client
//!
//! Read access to the log service through its public mirror REST API:
//! - `GET /api/v1/transactions/{id}` resolves a transaction
//! - `GET /api/v1/topics/{topic}/messages` lists entries of a log address
//!
//! No retries happen here. Both reads are idempotent, so callers that want
//! retries can simply call again.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::reference::{encode_path_segment, QueryKey};
use crate::core::timestamp::ConsensusTimestamp;
use crate::log::{truncate_body, EntryPage, LogEntry, LogError, LogReader, TransactionRecord};

/// Public testnet mirror node.
pub const DEFAULT_MIRROR_NODE: &str = "https://testnet.mirrornode.hedera.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Largest page the mirror API serves.
pub const MAX_PAGE_LIMIT: usize = 100;

/// HTTP client for the mirror REST API.
#[derive(Debug, Clone)]
pub struct MirrorNodeClient {
    base_url: String,
    client: reqwest::Client,
}

/// `GET /transactions/{id}` body.
#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<MirrorTransaction>,
}

#[derive(Debug, Deserialize)]
struct MirrorTransaction {
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    consensus_timestamp: Option<String>,
}

/// `GET /topics/{topic}/messages` body.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<MirrorMessage>,
}

#[derive(Debug, Deserialize)]
struct MirrorMessage {
    sequence_number: u64,
    consensus_timestamp: ConsensusTimestamp,
    message: String,
}

impl MirrorNodeClient {
    /// Create a client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Unavailable`] if the HTTP client cannot be built
    /// (for example, no TLS backend).
    pub fn new(base_url: impl Into<String>) -> Result<Self, LogError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LogError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transaction_url(&self, key: &QueryKey) -> String {
        format!("{}/api/v1/transactions/{}", self.base_url, key.encoded())
    }

    fn messages_url(&self, log_address: &str) -> String {
        format!(
            "{}/api/v1/topics/{}/messages",
            self.base_url,
            encode_path_segment(log_address)
        )
    }

    async fn get(&self, request: reqwest::RequestBuilder) -> Result<String, LogError> {
        let response = request
            .send()
            .await
            .map_err(|e| LogError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LogError::Unavailable(format!("failed to read body: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_status(status.as_u16(), body))
        }
    }
}

#[async_trait]
impl LogReader for MirrorNodeClient {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn fetch_transaction(&self, key: &QueryKey) -> Result<TransactionRecord, LogError> {
        let url = self.transaction_url(key);
        debug!("Querying transaction: {}", url);

        let body = self.get(self.client.get(&url)).await?;
        parse_transaction(&body)
    }

    #[instrument(skip(self))]
    async fn fetch_recent_entries(
        &self,
        log_address: &str,
        page: &EntryPage,
    ) -> Result<Vec<LogEntry>, LogError> {
        let url = self.messages_url(log_address);
        let limit = page.limit.clamp(1, MAX_PAGE_LIMIT).to_string();

        let mut query = vec![("order", "desc".to_string()), ("limit", limit)];
        if let Some(before) = page.before {
            query.push(("timestamp", format!("lt:{before}")));
        }
        debug!("Fetching topic messages: {} {:?}", url, query);

        let body = self.get(self.client.get(&url).query(&query)).await?;
        parse_messages(&body)
    }
}

/// Map a non-success HTTP status to a boundary error.
fn classify_status(status: u16, body: String) -> LogError {
    match status {
        404 => LogError::NotFound,
        429 | 500..=599 => LogError::Unavailable(format!("HTTP {status}: {}", truncate_body(body))),
        _ => LogError::Rejected {
            status,
            body: truncate_body(body),
        },
    }
}

/// Decode a transaction lookup body. The first listed transaction wins.
fn parse_transaction(body: &str) -> Result<TransactionRecord, LogError> {
    let response: TransactionsResponse = serde_json::from_str(body)
        .map_err(|e| LogError::InvalidResponse(format!("transaction body: {e}")))?;

    let tx = response.transactions.into_iter().next().ok_or(LogError::NotFound)?;

    let consensus_timestamp = tx
        .consensus_timestamp
        .map(|ts| ts.parse::<ConsensusTimestamp>())
        .transpose()
        .map_err(|e| LogError::InvalidResponse(e.to_string()))?;

    Ok(TransactionRecord {
        log_address: tx.entity_id.filter(|id| !id.is_empty()),
        consensus_timestamp,
    })
}

/// Decode a topic messages body.
fn parse_messages(body: &str) -> Result<Vec<LogEntry>, LogError> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| LogError::InvalidResponse(format!("messages body: {e}")))?;

    Ok(response
        .messages
        .into_iter()
        .map(|m| LogEntry {
            sequence_number: m.sequence_number,
            consensus_timestamp: m.consensus_timestamp,
            payload_base64: m.message,
        })
        .collect())
}
