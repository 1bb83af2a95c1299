//! Verification Orchestrator
//!
//! Composes normalization, log reads and matching into one call:
//!
//! ```text
//! reference ─► Normalizing ─► ResolvingTransaction ─► FetchingEntries
//!                                                          │
//!                     Valid ◄── Decoding ◄── Matching ◄────┘
//! ```
//!
//! Every stage can end the run with an `Invalid` verdict. Nothing retries.
//! The call only reads, so re-invoking it is always safe.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::reference::normalize;
use crate::log::mirror::MAX_PAGE_LIMIT;
use crate::log::{EntryPage, LogEntry, LogError, LogReader, TransactionRecord};
use crate::proof::record::ProofRecord;
use crate::verify::matcher::match_entry;
use crate::verify::verdict::{
    EntrySample, Evidence, FailureReason, Rejection, Verdict, VerifyStage,
};

/// Verification tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Entries requested per page, at most [`MAX_PAGE_LIMIT`].
    pub page_size: usize,
    /// Pages read before giving up on the target.
    pub max_pages: usize,
    /// Bound on a whole `verify` call. Too large to represent means unbounded.
    pub timeout: Duration,
    /// Candidates reported back when nothing matched.
    pub sample_size: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_LIMIT,
            max_pages: 5,
            timeout: Duration::from_secs(30),
            sample_size: 5,
        }
    }
}

/// Runs `verify(reference) -> Verdict` against a log reader.
#[derive(Clone)]
pub struct VerificationOrchestrator {
    reader: Arc<dyn LogReader>,
    config: VerifyConfig,
}

impl VerificationOrchestrator {
    /// Create an orchestrator with default tuning.
    pub fn new(reader: Arc<dyn LogReader>) -> Self {
        Self::with_config(reader, VerifyConfig::default())
    }

    /// Create an orchestrator with explicit tuning.
    ///
    /// `page_size` is clamped to `1..=MAX_PAGE_LIMIT`, the most the log
    /// service returns per page.
    pub fn with_config(reader: Arc<dyn LogReader>, mut config: VerifyConfig) -> Self {
        config.page_size = config.page_size.clamp(1, MAX_PAGE_LIMIT);
        Self { reader, config }
    }

    /// Current tuning.
    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Verify a human-supplied transaction reference.
    #[instrument(skip(self))]
    pub async fn verify(&self, reference: &str) -> Verdict {
        match self.run(reference.trim()).await {
            Ok(evidence) => {
                info!(
                    "Verified {} via {:?} at seq {}",
                    evidence.reference, evidence.matched_by, evidence.entry.sequence_number
                );
                Verdict::Valid(evidence)
            }
            Err(rejection) => {
                info!(
                    "Rejected {} at {:?}: {} ({})",
                    reference, rejection.stage, rejection.reason, rejection.detail
                );
                Verdict::Invalid(rejection)
            }
        }
    }

    async fn run(&self, reference: &str) -> Result<Evidence, Rejection> {
        let deadline = Instant::now().checked_add(self.config.timeout);

        let key = normalize(reference).map_err(|e| {
            Rejection::new(FailureReason::MalformedReference, VerifyStage::Normalizing, e.to_string())
        })?;
        debug!("Normalized {} to {}", reference, key);

        let transaction = bounded(deadline, self.reader.fetch_transaction(&key))
            .await
            .map_err(resolve_failure)?;

        let log_address = transaction.log_address.clone().ok_or_else(|| {
            Rejection::new(
                FailureReason::NoLogAddress,
                VerifyStage::ResolvingTransaction,
                format!("transaction {key} did not write to a log address"),
            )
        })?;
        debug!(
            "Transaction {} -> {} at {:?}",
            key, log_address, transaction.consensus_timestamp
        );

        let candidates = self.collect_candidates(deadline, &log_address, &transaction).await?;
        if candidates.is_empty() {
            return Err(Rejection::new(
                FailureReason::EntryNotFound,
                VerifyStage::FetchingEntries,
                format!("no entries found in {log_address}"),
            ));
        }

        let found = match_entry(&transaction, &candidates, reference).ok_or_else(|| Rejection {
            reason: FailureReason::EntryNotFound,
            stage: VerifyStage::Matching,
            detail: format!(
                "none of {} entries in {} matches {}",
                candidates.len(),
                log_address,
                reference
            ),
            recent_entries: candidates
                .iter()
                .take(self.config.sample_size)
                .map(EntrySample::from)
                .collect(),
        })?;

        let proof = ProofRecord::from_base64(&found.entry.payload_base64).map_err(|e| {
            Rejection::new(
                FailureReason::CorruptPayload,
                VerifyStage::Decoding,
                format!("entry {}: {}", found.entry.sequence_number, e),
            )
        })?;

        Ok(Evidence {
            reference: reference.to_string(),
            log_address,
            entry: found.entry.clone(),
            proof,
            matched_by: found.rule,
        })
    }

    /// Page backwards through the log address, newest first.
    ///
    /// Stops at the page holding the target timestamp, at a short page, once
    /// the pages reach back past the target, or after `max_pages`.
    async fn collect_candidates(
        &self,
        deadline: Option<Instant>,
        log_address: &str,
        transaction: &TransactionRecord,
    ) -> Result<Vec<LogEntry>, Rejection> {
        let target = transaction.consensus_timestamp;
        let mut candidates: Vec<LogEntry> = Vec::new();
        let mut page = EntryPage::latest(self.config.page_size);

        for page_number in 0..self.config.max_pages.max(1) {
            let batch = bounded(deadline, self.reader.fetch_recent_entries(log_address, &page))
                .await
                .map_err(fetch_failure)?;
            debug!("Page {} of {}: {} entries", page_number, log_address, batch.len());

            let Some(oldest) = batch.last().map(|e| e.consensus_timestamp) else {
                break;
            };
            let short = batch.len() < page.limit;
            let hit = target.is_some_and(|ts| batch.iter().any(|e| e.consensus_timestamp == ts));
            let reached_target = target.is_some_and(|ts| oldest <= ts);
            candidates.extend(batch);

            if hit || short || reached_target {
                break;
            }
            page = EntryPage::older_than(self.config.page_size, oldest);
        }

        Ok(candidates)
    }
}

/// Run a log call under the overall deadline, if there is one.
async fn bounded<T>(
    deadline: Option<Instant>,
    call: impl Future<Output = Result<T, LogError>>,
) -> Result<T, LogError> {
    let Some(deadline) = deadline else {
        return call.await;
    };
    tokio::time::timeout_at(deadline, call)
        .await
        .unwrap_or_else(|_| Err(LogError::Unavailable("verification timed out".to_string())))
}

fn resolve_failure(error: LogError) -> Rejection {
    let reason = match &error {
        LogError::NotFound => FailureReason::TransactionNotFound,
        // The service refused the id itself
        LogError::Rejected { status: 400, .. } => FailureReason::MalformedReference,
        _ => {
            warn!("Transaction lookup failed: {}", error);
            FailureReason::UpstreamUnavailable
        }
    };
    Rejection::new(reason, VerifyStage::ResolvingTransaction, error.to_string())
}

fn fetch_failure(error: LogError) -> Rejection {
    let reason = match &error {
        LogError::NotFound => FailureReason::EntryNotFound,
        _ => {
            warn!("Entry fetch failed: {}", error);
            FailureReason::UpstreamUnavailable
        }
    };
    Rejection::new(reason, VerifyStage::FetchingEntries, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::hash_document;
    use crate::core::timestamp::ConsensusTimestamp;
    use crate::core::reference::QueryKey;
    use crate::log::{InMemoryLog, LogWriter};
    use crate::proof::fingerprint::FingerprintComputer;
    use crate::verify::matcher::MatchRule;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    const TOPIC: &str = "0.0.6880493";

    fn proof_payload(bytes: &[u8]) -> Vec<u8> {
        FingerprintComputer::new("0.0.1")
            .compute("test.pdf", bytes)
            .unwrap()
            .to_payload()
            .unwrap()
    }

    fn ts(s: &str) -> ConsensusTimestamp {
        s.parse().unwrap()
    }

    /// Log with one anchored transaction `0.0.1@111.222` at consensus 111.222.
    fn seeded_log(payload: &[u8]) -> Arc<InMemoryLog> {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        log.record_transaction(
            "0.0.1@111.222",
            TransactionRecord {
                log_address: Some(TOPIC.into()),
                consensus_timestamp: Some(ts("111.222")),
            },
        )
        .unwrap();
        log.append_entry(
            TOPIC,
            LogEntry {
                sequence_number: 1,
                consensus_timestamp: ts("111.222"),
                payload_base64: BASE64.encode(payload),
            },
        );
        log
    }

    fn reason(verdict: &Verdict) -> FailureReason {
        verdict.failure_reason().expect("expected an invalid verdict")
    }

    #[tokio::test]
    async fn test_valid_by_timestamp() {
        let log = seeded_log(&proof_payload(b"abc"));
        let orchestrator = VerificationOrchestrator::new(log);

        let verdict = orchestrator.verify("0.0.1@111.222").await;
        assert!(verdict.is_valid());
        assert_eq!(verdict.decoded_proof().unwrap().content_hash, hash_document(b"abc"));
        assert_eq!(verdict.matched_entry().unwrap().sequence_number, 1);
        match verdict {
            Verdict::Valid(evidence) => {
                assert_eq!(evidence.matched_by, MatchRule::ConsensusTimestamp);
                assert_eq!(evidence.log_address, TOPIC);
                assert_eq!(evidence.reference, "0.0.1@111.222");
            }
            Verdict::Invalid(r) => panic!("unexpected rejection {r:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_reference_is_transaction_not_found() {
        let log = seeded_log(&proof_payload(b"abc"));
        let orchestrator = VerificationOrchestrator::new(log);

        let verdict = orchestrator.verify("0.0.1@999.999").await;
        assert!(!verdict.is_valid());
        assert_eq!(reason(&verdict), FailureReason::TransactionNotFound);
    }

    #[tokio::test]
    async fn test_malformed_reference_never_hits_the_log() {
        let log = seeded_log(&proof_payload(b"abc"));
        let orchestrator = VerificationOrchestrator::new(log.clone());

        let verdict = orchestrator.verify("not-a-reference").await;
        assert_eq!(reason(&verdict), FailureReason::MalformedReference);
        assert_eq!(log.transaction_lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_log_address() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        log.record_transaction(
            "0.0.1@5.0",
            TransactionRecord {
                log_address: None,
                consensus_timestamp: Some(ts("5.0")),
            },
        )
        .unwrap();

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@5").await;
        assert_eq!(reason(&verdict), FailureReason::NoLogAddress);
    }

    #[tokio::test]
    async fn test_empty_log_address() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        log.record_transaction(
            "0.0.1@5.0",
            TransactionRecord {
                log_address: Some(TOPIC.into()),
                consensus_timestamp: Some(ts("5.0")),
            },
        )
        .unwrap();

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@5.0").await;
        match verdict {
            Verdict::Invalid(rejection) => {
                assert_eq!(rejection.reason, FailureReason::EntryNotFound);
                assert_eq!(rejection.stage, VerifyStage::FetchingEntries);
                assert!(rejection.recent_entries.is_empty());
            }
            Verdict::Valid(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_miss_reports_recent_entries() {
        let log = seeded_log(&proof_payload(b"abc"));
        // Move the transaction so no entry carries its timestamp
        log.record_transaction(
            "0.0.1@111.222",
            TransactionRecord {
                log_address: Some(TOPIC.into()),
                consensus_timestamp: Some(ts("50.0")),
            },
        )
        .unwrap();
        for i in 0..7u8 {
            log.append_payload(TOPIC, &[b'x', i]);
        }

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@111.222").await;
        match verdict {
            Verdict::Invalid(rejection) => {
                assert_eq!(rejection.reason, FailureReason::EntryNotFound);
                assert_eq!(rejection.stage, VerifyStage::Matching);
                let seqs: Vec<u64> =
                    rejection.recent_entries.iter().map(|s| s.sequence_number).collect();
                assert_eq!(seqs, vec![8, 7, 6, 5, 4]);
            }
            Verdict::Valid(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_timestamp_match_wins_over_embedded_reference() {
        let log = seeded_log(&proof_payload(b"genuine"));
        // A newer foreign entry claims the same transaction id
        let claim = br#"{"txId":"0.0.1@111.222"}"#;
        log.append_payload(TOPIC, claim);

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@111.222").await;
        assert!(verdict.is_valid());
        assert_eq!(verdict.matched_entry().unwrap().consensus_timestamp, ts("111.222"));
        assert_eq!(verdict.decoded_proof().unwrap().content_hash, hash_document(b"genuine"));
    }

    #[tokio::test]
    async fn test_embedded_reference_fallback_end_to_end() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        log.record_transaction(
            "0.0.1@111.222",
            TransactionRecord {
                log_address: Some(TOPIC.into()),
                consensus_timestamp: None,
            },
        )
        .unwrap();

        let mut json: serde_json::Value =
            serde_json::from_slice(&proof_payload(b"abc")).unwrap();
        json["txId"] = "0.0.1@111.222".into();
        log.append_payload(TOPIC, json.to_string().as_bytes());
        log.append_payload(TOPIC, b"noise");

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@111.222").await;
        match verdict {
            Verdict::Valid(evidence) => {
                assert_eq!(evidence.matched_by, MatchRule::EmbeddedReference);
                assert_eq!(evidence.proof.content_hash, hash_document(b"abc"));
            }
            Verdict::Invalid(r) => panic!("unexpected rejection {r:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_match_is_corrupt_payload() {
        let log = seeded_log(br#"{"type":"someone-else","hello":"world"}"#);

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@111.222").await;
        match verdict {
            Verdict::Invalid(rejection) => {
                assert_eq!(rejection.reason, FailureReason::CorruptPayload);
                assert_eq!(rejection.stage, VerifyStage::Decoding);
            }
            Verdict::Valid(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_upstream_failure_is_distinct_from_not_found() {
        let log = seeded_log(&proof_payload(b"abc"));
        log.fail_reads(Some(LogError::Unavailable("HTTP 503".into())));

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@111.222").await;
        assert_eq!(reason(&verdict), FailureReason::UpstreamUnavailable);
        assert!(reason(&verdict).is_retryable());
    }

    #[tokio::test]
    async fn test_bad_request_is_malformed_reference() {
        let log = seeded_log(&proof_payload(b"abc"));
        log.fail_reads(Some(LogError::Rejected { status: 400, body: "Invalid parameter".into() }));

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@x.y").await;
        assert_eq!(reason(&verdict), FailureReason::MalformedReference);
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_unavailable() {
        let log = seeded_log(&proof_payload(b"abc"));
        log.delay_reads(Some(Duration::from_secs(3600)));
        let config = VerifyConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };

        let verdict = VerificationOrchestrator::with_config(log, config)
            .verify("0.0.1@111.222")
            .await;
        match verdict {
            Verdict::Invalid(rejection) => {
                assert_eq!(rejection.reason, FailureReason::UpstreamUnavailable);
                assert_eq!(rejection.stage, VerifyStage::ResolvingTransaction);
            }
            Verdict::Valid(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_pages_back_to_older_target() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        let receipt = log.submit(TOPIC, &proof_payload(b"old document")).await.unwrap();
        for i in 0..25u8 {
            log.append_payload(TOPIC, &[i]);
        }

        let config = VerifyConfig {
            page_size: 10,
            ..Default::default()
        };
        let verdict = VerificationOrchestrator::with_config(log.clone(), config)
            .verify(&receipt.transaction_id)
            .await;

        assert!(verdict.is_valid());
        assert_eq!(verdict.matched_entry().unwrap().sequence_number, 1);
        assert_eq!(log.entry_fetches(), 3);
    }

    #[tokio::test]
    async fn test_page_cap_limits_search() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        let receipt = log.submit(TOPIC, &proof_payload(b"old document")).await.unwrap();
        for i in 0..25u8 {
            log.append_payload(TOPIC, &[i]);
        }

        let config = VerifyConfig {
            page_size: 10,
            max_pages: 2,
            ..Default::default()
        };
        let verdict = VerificationOrchestrator::with_config(log.clone(), config)
            .verify(&receipt.transaction_id)
            .await;

        assert_eq!(reason(&verdict), FailureReason::EntryNotFound);
        assert_eq!(log.entry_fetches(), 2);
    }

    #[tokio::test]
    async fn test_stops_paging_once_target_page_seen() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        for i in 0..25u8 {
            log.append_payload(TOPIC, &[i]);
        }
        let receipt = log.submit(TOPIC, &proof_payload(b"fresh")).await.unwrap();

        let config = VerifyConfig {
            page_size: 10,
            ..Default::default()
        };
        let verdict = VerificationOrchestrator::with_config(log.clone(), config)
            .verify(&receipt.transaction_id)
            .await;

        assert!(verdict.is_valid());
        assert_eq!(log.entry_fetches(), 1);
    }

    /// Reader that serves at most `MAX_PAGE_LIMIT` entries per page.
    struct CappedPages(Arc<InMemoryLog>);

    #[async_trait::async_trait]
    impl LogReader for CappedPages {
        async fn fetch_transaction(&self, key: &QueryKey) -> Result<TransactionRecord, LogError> {
            self.0.fetch_transaction(key).await
        }

        async fn fetch_recent_entries(
            &self,
            log_address: &str,
            page: &EntryPage,
        ) -> Result<Vec<LogEntry>, LogError> {
            let capped = EntryPage {
                limit: page.limit.min(MAX_PAGE_LIMIT),
                before: page.before,
            };
            self.0.fetch_recent_entries(log_address, &capped).await
        }
    }

    #[tokio::test]
    async fn test_oversized_page_size_still_pages() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        let receipt = log.submit(TOPIC, &proof_payload(b"old document")).await.unwrap();
        for i in 0..150u8 {
            log.append_payload(TOPIC, &[i]);
        }

        let config = VerifyConfig {
            page_size: 200,
            ..Default::default()
        };
        let orchestrator =
            VerificationOrchestrator::with_config(Arc::new(CappedPages(log.clone())), config);
        assert_eq!(orchestrator.config().page_size, MAX_PAGE_LIMIT);

        let verdict = orchestrator.verify(&receipt.transaction_id).await;
        assert!(verdict.is_valid(), "{verdict:?}");
        assert_eq!(log.entry_fetches(), 2);
    }

    #[test]
    fn test_zero_page_size_is_raised() {
        let log = Arc::new(InMemoryLog::new("0.0.1"));
        let config = VerifyConfig {
            page_size: 0,
            ..Default::default()
        };
        let orchestrator = VerificationOrchestrator::with_config(log, config);
        assert_eq!(orchestrator.config().page_size, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_means_no_deadline() {
        let log = seeded_log(&proof_payload(b"abc"));
        let config = VerifyConfig {
            timeout: Duration::MAX,
            ..Default::default()
        };

        let verdict = VerificationOrchestrator::with_config(log, config)
            .verify("0.0.1@111.222")
            .await;
        assert!(verdict.is_valid());
    }

    #[tokio::test]
    async fn test_legacy_producer_record_is_valid() {
        let legacy = br#"{"type":"hiremind-credential-proof","fileName":"cv.pdf","sha256":"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad","uploadedAt":"2025-09-22T10:52:12.951Z","issuer":"0.0.6871751"}"#;
        let log = seeded_log(legacy);

        let verdict = VerificationOrchestrator::new(log).verify("0.0.1@111.222").await;
        assert!(verdict.is_valid(), "{verdict:?}");
        let proof = verdict.decoded_proof().unwrap();
        assert_eq!(proof.kind, "hiremind-credential-proof");
        assert_eq!(proof.content_hash, hash_document(b"abc"));
        assert!(verdict.confirm_document(b"abc").is_valid());
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let log = seeded_log(&proof_payload(b"abc"));
        let orchestrator = VerificationOrchestrator::new(log);

        let first = orchestrator.verify("0.0.1@111.222").await;
        let second = orchestrator.verify("0.0.1@111.222").await;
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );

        let miss_a = orchestrator.verify("0.0.1@999.999").await;
        let miss_b = orchestrator.verify("0.0.1@999.999").await;
        assert_eq!(miss_a, miss_b);
    }

    #[tokio::test]
    async fn test_concurrent_verifications_are_independent() {
        let log = seeded_log(&proof_payload(b"abc"));
        let orchestrator = VerificationOrchestrator::new(log);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    let reference = if i % 2 == 0 { "0.0.1@111.222" } else { "0.0.1@999.999" };
                    orchestrator.verify(reference).await
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let verdict = handle.await.unwrap();
            assert_eq!(verdict.is_valid(), i % 2 == 0);
        }
    }
}
