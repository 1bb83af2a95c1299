//! Anchor Submission
//!
//! Encodes a proof record and appends it to the log exactly once.
//! Retrying is the caller's choice: the log is append-only, so a second
//! submission simply creates a second, independent entry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::log::{LogError, LogWriter};
use crate::proof::record::{ProofRecord, MAX_PAYLOAD_BYTES};
use crate::proof::AnchorError;

/// Default bound on a whole submission.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Durable pointer to an anchored record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReference {
    /// Log address written to.
    pub log_address: String,
    /// External transaction id, `<account>@<seconds>.<nanos>`.
    pub external_tx_id: String,
    /// Acceptance status reported at submission time.
    pub consensus_status: String,
}

/// Submits proof records to one log address.
#[derive(Clone)]
pub struct AnchorSubmitter {
    writer: Arc<dyn LogWriter>,
    log_address: String,
    timeout: Duration,
}

impl AnchorSubmitter {
    /// Create a submitter writing to `log_address`.
    pub fn new(writer: Arc<dyn LogWriter>, log_address: impl Into<String>) -> Self {
        Self {
            writer,
            log_address: log_address.into(),
            timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    /// Bound the whole submission by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log address this submitter writes to.
    pub fn log_address(&self) -> &str {
        &self.log_address
    }

    /// Encode and submit `proof`.
    #[instrument(skip(self, proof), fields(document = %proof.document_name, hash = %proof.content_hash))]
    pub async fn submit(&self, proof: &ProofRecord) -> Result<AnchorReference, AnchorError> {
        let payload = proof
            .to_payload()
            .map_err(|e| AnchorError::Encoding(e.to_string()))?;

        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(AnchorError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }

        let receipt = match tokio::time::timeout(
            self.timeout,
            self.writer.submit(&self.log_address, &payload),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(cause)) => {
                warn!("Submission rejected: {}", cause);
                return Err(AnchorError::SubmissionFailed { cause });
            }
            Err(_) => {
                warn!("Submission timed out after {:?}", self.timeout);
                return Err(AnchorError::SubmissionFailed {
                    cause: LogError::Unavailable(format!("timed out after {:?}", self.timeout)),
                });
            }
        };

        info!(
            "Anchored in {} as {} ({})",
            self.log_address, receipt.transaction_id, receipt.status
        );

        Ok(AnchorReference {
            log_address: self.log_address.clone(),
            external_tx_id: receipt.transaction_id,
            consensus_status: receipt.status,
        })
    }
}
