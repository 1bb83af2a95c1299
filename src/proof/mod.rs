//! Anchoring
//!
//! Produces proof records and writes them to the log:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ANCHOR PATH                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  fingerprint.rs  - document bytes -> ProofRecord            │
//! │  record.rs       - ProofRecord wire codec (JSON)            │
//! │  submit.rs       - single-shot submission -> reference      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod fingerprint;
pub mod record;
pub mod submit;

use thiserror::Error;

use crate::log::LogError;

// Re-export key types
pub use fingerprint::FingerprintComputer;
pub use record::{
    decode_payload, PayloadError, ProofRecord, LEGACY_PROOF_KINDS, MAX_PAYLOAD_BYTES, PROOF_KIND,
};
pub use submit::{AnchorReference, AnchorSubmitter};

/// Errors on the anchor path.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// Document has no bytes.
    #[error("document is empty")]
    EmptyDocument,

    /// Encoded record exceeds the log's message limit.
    #[error("proof payload is {size} bytes, limit is {max}")]
    PayloadTooLarge {
        /// Encoded size.
        size: usize,
        /// Allowed size.
        max: usize,
    },

    /// Record could not be encoded.
    #[error("failed to encode proof record: {0}")]
    Encoding(String),

    /// The log did not accept the submission.
    #[error("submission failed: {cause}")]
    SubmissionFailed {
        /// Boundary error reported by the writer.
        cause: LogError,
    },
}

impl AnchorError {
    /// True if submitting again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SubmissionFailed { cause } if cause.is_transient())
    }
}
