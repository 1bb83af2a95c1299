//! Notary
//!
//! Single entry point for both paths:
//!
//! ```text
//! anchor(name, bytes)  ─► FingerprintComputer ─► AnchorSubmitter ─► Anchored
//! verify(reference)    ─► VerificationOrchestrator ─────────────────► Verdict
//! verify_document(...) ─► verify ─► hash comparison ────────────────► Verdict
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::log::{LogReader, LogWriter};
use crate::proof::{AnchorError, AnchorReference, AnchorSubmitter, FingerprintComputer, ProofRecord};
use crate::verify::{VerificationOrchestrator, Verdict, VerifyConfig};

/// Result of anchoring a document: the record and where it landed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchored {
    /// The submitted proof record.
    pub proof: ProofRecord,
    /// Pointer to the log entry holding it.
    pub reference: AnchorReference,
}

/// Anchors documents and verifies references.
#[derive(Clone)]
pub struct Notary {
    fingerprint: FingerprintComputer,
    submitter: AnchorSubmitter,
    orchestrator: VerificationOrchestrator,
}

impl Notary {
    /// Assemble a notary from its parts.
    pub fn new(
        fingerprint: FingerprintComputer,
        submitter: AnchorSubmitter,
        orchestrator: VerificationOrchestrator,
    ) -> Self {
        Self {
            fingerprint,
            submitter,
            orchestrator,
        }
    }

    /// Notary reading and writing through one log handle.
    pub fn over<L>(log: Arc<L>, issuer: &str, log_address: &str, config: VerifyConfig) -> Self
    where
        L: LogReader + LogWriter + 'static,
    {
        Self::new(
            FingerprintComputer::new(issuer),
            AnchorSubmitter::new(log.clone(), log_address),
            VerificationOrchestrator::with_config(log, config),
        )
    }

    /// Log address documents are anchored to.
    pub fn log_address(&self) -> &str {
        self.submitter.log_address()
    }

    /// Fingerprint `bytes` and anchor the record.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn anchor(&self, document_name: &str, bytes: &[u8]) -> Result<Anchored, AnchorError> {
        let proof = self.fingerprint.compute(document_name, bytes)?;
        let reference = self.submitter.submit(&proof).await?;
        Ok(Anchored { proof, reference })
    }

    /// Verify a transaction reference.
    pub async fn verify(&self, reference: &str) -> Verdict {
        self.orchestrator.verify(reference).await
    }

    /// Verify a reference and check the anchored hash against `bytes`.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn verify_document(&self, reference: &str, bytes: &[u8]) -> Verdict {
        self.orchestrator.verify(reference).await.confirm_document(bytes)
    }
}
