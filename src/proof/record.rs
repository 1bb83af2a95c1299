//! Proof Record Codec
//!
//! The payload anchored per document. One codec serves both directions:
//! `to_payload` on submission and `from_payload` on verification. Field
//! order is fixed by the struct, so encoding is deterministic.
//!
//! Wire form:
//!
//! ```text
//! {"type":"document-anchor-proof","fileName":"cv.pdf","sha256":"<64 hex>",
//!  "uploadedAt":"2025-09-22T10:52:12.951Z","issuer":"0.0.6871751"}
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::hash::ContentHash;

/// Schema discriminator carried in every record we produce.
pub const PROOF_KIND: &str = "document-anchor-proof";

/// Discriminators written by earlier producers. Their records stay decodable.
pub const LEGACY_PROOF_KINDS: &[&str] = &["hiremind-credential-proof"];

/// Largest payload accepted for a single log message.
pub const MAX_PAYLOAD_BYTES: usize = 1024;

/// Canonical proof payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    /// Schema discriminator: [`PROOF_KIND`] for records we produce, or one
    /// of [`LEGACY_PROOF_KINDS`] for records anchored earlier.
    #[serde(rename = "type")]
    pub kind: String,

    /// Original file name. Advisory only.
    #[serde(rename = "fileName")]
    pub document_name: String,

    /// SHA-256 of the document bytes.
    #[serde(rename = "sha256")]
    pub content_hash: ContentHash,

    /// Submission time as claimed by the producer. Advisory only.
    #[serde(rename = "uploadedAt")]
    pub issued_at: DateTime<Utc>,

    /// Log-service account that submitted the record.
    pub issuer: String,
}

/// Errors decoding a stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Stored bytes are not valid base64.
    #[error("payload is not base64: {0}")]
    Base64(String),

    /// Bytes do not decode to the expected JSON shape.
    #[error("payload is not a proof record: {0}")]
    Json(String),

    /// Record decodes but carries a foreign discriminator.
    #[error("unexpected record type {0:?}")]
    UnexpectedKind(String),
}

impl ProofRecord {
    /// Build a record of our own kind.
    pub fn new(
        document_name: impl Into<String>,
        content_hash: ContentHash,
        issued_at: DateTime<Utc>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            kind: PROOF_KIND.to_string(),
            document_name: document_name.into(),
            content_hash,
            issued_at,
            issuer: issuer.into(),
        }
    }

    /// Encode to the exact bytes submitted to the log.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// True if `kind` names a proof record this codec decodes.
    pub fn is_known_kind(kind: &str) -> bool {
        kind == PROOF_KIND || LEGACY_PROOF_KINDS.contains(&kind)
    }

    /// Decode payload bytes produced by [`ProofRecord::to_payload`] or by an
    /// earlier producer.
    pub fn from_payload(bytes: &[u8]) -> Result<Self, PayloadError> {
        let record: Self =
            serde_json::from_slice(bytes).map_err(|e| PayloadError::Json(e.to_string()))?;
        if !Self::is_known_kind(&record.kind) {
            return Err(PayloadError::UnexpectedKind(record.kind));
        }
        Ok(record)
    }

    /// Decode a base64 payload as stored by the log.
    pub fn from_base64(payload: &str) -> Result<Self, PayloadError> {
        Self::from_payload(&decode_payload(payload)?)
    }
}

/// Decode a stored base64 payload to raw bytes.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, PayloadError> {
    BASE64
        .decode(payload.trim())
        .map_err(|e| PayloadError::Base64(e.to_string()))
}
