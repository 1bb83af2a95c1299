//! Fingerprint Computation
//!
//! Turns document bytes into a [`ProofRecord`]. The hash covers the exact
//! bytes given: no line-ending conversion, no trimming.

use chrono::{DateTime, SubsecRound, Utc};

use crate::core::hash::hash_document;
use crate::proof::record::ProofRecord;
use crate::proof::AnchorError;

/// Builds proof records for a fixed issuer.
#[derive(Debug, Clone)]
pub struct FingerprintComputer {
    issuer: String,
    allow_empty: bool,
}

impl FingerprintComputer {
    /// Create a computer issuing records as `issuer`. Empty documents are rejected.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            allow_empty: false,
        }
    }

    /// Accept empty documents.
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Issuer stamped on every record.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Compute a record stamped with the current time (millisecond precision).
    pub fn compute(&self, document_name: &str, bytes: &[u8]) -> Result<ProofRecord, AnchorError> {
        self.compute_at(document_name, bytes, Utc::now().trunc_subsecs(3))
    }

    /// Compute a record with an explicit issue time.
    pub fn compute_at(
        &self,
        document_name: &str,
        bytes: &[u8],
        issued_at: DateTime<Utc>,
    ) -> Result<ProofRecord, AnchorError> {
        if bytes.is_empty() && !self.allow_empty {
            return Err(AnchorError::EmptyDocument);
        }

        Ok(ProofRecord::new(
            document_name,
            hash_document(bytes),
            issued_at,
            self.issuer.clone(),
        ))
    }
}
