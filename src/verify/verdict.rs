//! Verification Verdicts
//!
//! A verdict is an expected, first-class result. Negative outcomes are data,
//! not errors: a caller receives a reason it can act on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::hash::hash_document;
use crate::core::timestamp::ConsensusTimestamp;
use crate::log::LogEntry;
use crate::proof::record::ProofRecord;
use crate::verify::matcher::MatchRule;

/// Why a verification did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Reference is not `<account>@<seconds>.<nanos>`.
    MalformedReference,
    /// The log has no such transaction.
    TransactionNotFound,
    /// The transaction did not write to a log address.
    NoLogAddress,
    /// No entry among the fetched candidates evidences the transaction.
    EntryNotFound,
    /// The log service could not be reached or failed.
    UpstreamUnavailable,
    /// The evidencing entry is not a decodable proof record.
    CorruptPayload,
    /// The anchored hash differs from the supplied document's hash.
    HashMismatch,
}

impl FailureReason {
    /// True if the same call might pass later without any change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedReference => write!(f, "Malformed transaction reference"),
            Self::TransactionNotFound => write!(f, "Transaction not found"),
            Self::NoLogAddress => write!(f, "Transaction has no log address"),
            Self::EntryNotFound => write!(f, "Matching log entry not found"),
            Self::UpstreamUnavailable => write!(f, "Log service unavailable"),
            Self::CorruptPayload => write!(f, "Log entry is not a valid proof record"),
            Self::HashMismatch => write!(f, "Document hash does not match anchored hash"),
        }
    }
}

/// Verification stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStage {
    /// Converting the reference to a query key.
    Normalizing,
    /// Looking up the transaction.
    ResolvingTransaction,
    /// Paging through log entries.
    FetchingEntries,
    /// Selecting the evidencing entry.
    Matching,
    /// Decoding the proof record.
    Decoding,
    /// Comparing against a supplied document.
    Comparing,
}

/// Position and time of a recent entry, for diagnosing misses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySample {
    /// Sequence number within the log address.
    pub sequence_number: u64,
    /// Consensus timestamp.
    pub consensus_timestamp: ConsensusTimestamp,
}

impl From<&LogEntry> for EntrySample {
    fn from(entry: &LogEntry) -> Self {
        Self {
            sequence_number: entry.sequence_number,
            consensus_timestamp: entry.consensus_timestamp,
        }
    }
}

/// Evidence behind a passing verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Reference as supplied by the caller.
    pub reference: String,
    /// Log address holding the entry.
    pub log_address: String,
    /// The matched entry.
    pub entry: LogEntry,
    /// Proof record decoded from the entry.
    pub proof: ProofRecord,
    /// Rule that matched the entry.
    pub matched_by: MatchRule,
}

/// Details of a failing verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Failure taxonomy.
    pub reason: FailureReason,
    /// Stage that failed.
    pub stage: VerifyStage,
    /// Human-readable detail.
    pub detail: String,
    /// Newest candidates seen, populated when no entry matched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_entries: Vec<EntrySample>,
}

impl Rejection {
    /// Rejection without samples.
    pub fn new(reason: FailureReason, stage: VerifyStage, detail: impl Into<String>) -> Self {
        Self {
            reason,
            stage,
            detail: detail.into(),
            recent_entries: Vec::new(),
        }
    }
}

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// The reference is backed by a decodable proof record.
    Valid(Evidence),
    /// Verification failed for the given reason.
    Invalid(Rejection),
}

impl Verdict {
    /// Did verification pass?
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Failure reason, if invalid.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(rejection) => Some(rejection.reason),
        }
    }

    /// Matched entry, if valid.
    pub fn matched_entry(&self) -> Option<&LogEntry> {
        match self {
            Self::Valid(evidence) => Some(&evidence.entry),
            Self::Invalid(_) => None,
        }
    }

    /// Decoded proof record, if valid.
    pub fn decoded_proof(&self) -> Option<&ProofRecord> {
        match self {
            Self::Valid(evidence) => Some(&evidence.proof),
            Self::Invalid(_) => None,
        }
    }

    /// Check a passing verdict against locally supplied document bytes.
    ///
    /// A valid verdict whose anchored hash differs from `document`'s hash
    /// becomes `Invalid{HashMismatch}`. Invalid verdicts pass through.
    pub fn confirm_document(self, document: &[u8]) -> Verdict {
        let evidence = match self {
            Self::Valid(evidence) => evidence,
            invalid @ Self::Invalid(_) => return invalid,
        };

        let actual = hash_document(document);
        if actual == evidence.proof.content_hash {
            return Self::Valid(evidence);
        }

        Self::Invalid(Rejection::new(
            FailureReason::HashMismatch,
            VerifyStage::Comparing,
            format!(
                "document hashes to {}, entry {} anchors {}",
                actual, evidence.entry.sequence_number, evidence.proof.content_hash
            ),
        ))
    }
}

impl From<Rejection> for Verdict {
    fn from(rejection: Rejection) -> Self {
        Self::Invalid(rejection)
    }
}
