//! Log Service Boundary
//!
//! Request/response seam to the external append-only consensus log.
//! Everything past this module is opaque: the core only sees transactions,
//! entries and submission receipts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    LOG BOUNDARY                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LogReader       - transaction lookup, recent entries       │
//! │  LogWriter       - single-shot payload submission           │
//! │                                                             │
//! │  mirror.rs       - MirrorNodeClient (HTTP reads)            │
//! │  gateway.rs      - GatewayWriter (HTTP submission relay)    │
//! │  memory.rs       - InMemoryLog (reads + writes, offline)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod gateway;
pub mod memory;
pub mod mirror;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::reference::QueryKey;
use crate::core::timestamp::ConsensusTimestamp;

pub use gateway::GatewayWriter;
pub use memory::InMemoryLog;
pub use mirror::MirrorNodeClient;

/// Errors reported by the log service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The service has no record for the request.
    #[error("not found")]
    NotFound,

    /// Transport failure, timeout, throttling or server-side error.
    #[error("log service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the request (4xx other than 404/429).
    #[error("log service rejected request (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The service answered with a body we could not interpret.
    #[error("invalid response from log service: {0}")]
    InvalidResponse(String),
}

impl LogError {
    /// True if a later identical request might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A resolved transaction: where it was written and when it was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Log address (topic) the transaction wrote to, if any.
    pub log_address: Option<String>,
    /// Consensus timestamp assigned to the transaction.
    pub consensus_timestamp: Option<ConsensusTimestamp>,
}

/// One message as stored by the log service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position within the log address, assigned by the service.
    pub sequence_number: u64,
    /// Acceptance time, assigned by the service.
    pub consensus_timestamp: ConsensusTimestamp,
    /// Payload bytes as stored, base64 encoded.
    pub payload_base64: String,
}

/// Window of entries to fetch, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPage {
    /// Maximum number of entries.
    pub limit: usize,
    /// Only entries strictly older than this timestamp.
    pub before: Option<ConsensusTimestamp>,
}

impl EntryPage {
    /// The newest `limit` entries.
    pub fn latest(limit: usize) -> Self {
        Self { limit, before: None }
    }

    /// The `limit` entries immediately older than `before`.
    pub fn older_than(limit: usize, before: ConsensusTimestamp) -> Self {
        Self {
            limit,
            before: Some(before),
        }
    }
}

/// Acknowledgement returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// External transaction id, `<account>@<seconds>.<nanos>`.
    pub transaction_id: String,
    /// Acceptance status reported by the service.
    pub status: String,
}

/// Read side of the log service.
///
/// Both operations are read-only and idempotent.
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Resolve a normalized reference to its transaction record.
    async fn fetch_transaction(&self, key: &QueryKey) -> Result<TransactionRecord, LogError>;

    /// Fetch entries of a log address, newest first.
    async fn fetch_recent_entries(
        &self,
        log_address: &str,
        page: &EntryPage,
    ) -> Result<Vec<LogEntry>, LogError>;
}

/// Write side of the log service.
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Append a payload to a log address. Called once per submission.
    async fn submit(&self, log_address: &str, payload: &[u8]) -> Result<SubmitReceipt, LogError>;
}

/// Truncate a response body for error reporting.
pub(crate) fn truncate_body(mut body: String) -> String {
    const MAX_BODY: usize = 512;
    if body.len() > MAX_BODY {
        let mut cut = MAX_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
