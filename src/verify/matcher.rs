//! Entry Matching
//!
//! Picks the log entry that evidences a transaction. Rules are tried in
//! strict priority order over the whole candidate list:
//!
//! 1. exact consensus timestamp (the log service vouches for the linkage)
//! 2. embedded reference equal to the expected transaction id
//!
//! Nothing weaker is accepted. Content-hash containment in the reference
//! string is not a rule.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::log::{LogEntry, TransactionRecord};
use crate::proof::record::{decode_payload, PayloadError};

/// Which rule selected the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Entry timestamp equals the transaction's consensus timestamp.
    ConsensusTimestamp,
    /// Entry payload names the expected transaction id.
    EmbeddedReference,
}

/// A selected entry and the rule that selected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    /// The evidencing entry.
    pub entry: &'a LogEntry,
    /// Rule that matched.
    pub rule: MatchRule,
}

/// Transaction id hints a producer may embed in its payload.
#[derive(Debug, Default, Deserialize)]
struct EmbeddedReference {
    #[serde(rename = "txId", default)]
    tx_id: Option<String>,
    #[serde(default)]
    tx: Option<String>,
}

impl EmbeddedReference {
    fn decode(entry: &LogEntry) -> Result<Self, PayloadError> {
        let bytes = decode_payload(&entry.payload_base64)?;
        serde_json::from_slice(&bytes).map_err(|e| PayloadError::Json(e.to_string()))
    }

    fn names(&self, expected_tx_id: &str) -> bool {
        self.tx_id.as_deref() == Some(expected_tx_id) || self.tx.as_deref() == Some(expected_tx_id)
    }
}

/// Select the entry evidencing `target` among `candidates`.
///
/// Returns the first exact-timestamp match, else the first embedded-reference
/// match in candidate order, else `None`. Candidates whose payload cannot be
/// decoded are skipped for rule 2; they never abort the scan.
pub fn match_entry<'a>(
    target: &TransactionRecord,
    candidates: &'a [LogEntry],
    expected_tx_id: &str,
) -> Option<Match<'a>> {
    if let Some(ts) = target.consensus_timestamp {
        if let Some(entry) = candidates.iter().find(|e| e.consensus_timestamp == ts) {
            return Some(Match {
                entry,
                rule: MatchRule::ConsensusTimestamp,
            });
        }
    }

    candidates
        .iter()
        .find(|entry| match EmbeddedReference::decode(entry) {
            Ok(reference) => reference.names(expected_tx_id),
            Err(e) => {
                trace!("Skipping entry {}: {}", entry.sequence_number, e);
                false
            }
        })
        .map(|entry| Match {
            entry,
            rule: MatchRule::EmbeddedReference,
        })
}
