//! In-Memory Log
//!
//! A self-contained append-only log implementing both sides of the boundary.
//! Used by tests and by the offline `demo` command.
//!
//! Behaves like the real service where it matters to the core:
//! - consensus timestamps are strictly increasing and differ from the
//!   transaction id's valid-start time
//! - sequence numbers start at 1 per log address
//! - reads return newest first
//!
//! Failures and latency can be injected per side.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use crate::core::reference::{normalize, QueryKey, ReferenceError};
use crate::core::timestamp::ConsensusTimestamp;
use crate::log::{EntryPage, LogEntry, LogError, LogReader, LogWriter, SubmitReceipt, TransactionRecord};

/// Default starting clock (2023-11-14T22:13:20Z).
const DEFAULT_CLOCK_START: u64 = 1_700_000_000;

/// Nanoseconds between valid start and consensus for submitted transactions.
const CONSENSUS_LAG_NANOS: u32 = 250_000_000;

/// Nanoseconds the clock advances per submission.
const CLOCK_STEP_NANOS: u32 = 1_000_000;

#[derive(Debug, Default)]
struct LogState {
    clock: ConsensusTimestamp,
    entries: BTreeMap<String, Vec<LogEntry>>,
    transactions: BTreeMap<String, TransactionRecord>,
    read_failure: Option<LogError>,
    write_failure: Option<LogError>,
    read_delay: Option<Duration>,
}

/// Append-only log held in memory.
#[derive(Debug)]
pub struct InMemoryLog {
    account: String,
    state: Mutex<LogState>,
    transaction_lookups: AtomicUsize,
    entry_fetches: AtomicUsize,
    submissions: AtomicUsize,
}

impl InMemoryLog {
    /// Create a log that assigns transaction ids to `account`.
    pub fn new(account: impl Into<String>) -> Self {
        Self::starting_at(account, ConsensusTimestamp::new(DEFAULT_CLOCK_START, 0))
    }

    /// Create a log whose clock starts at `start`.
    pub fn starting_at(account: impl Into<String>, start: ConsensusTimestamp) -> Self {
        Self {
            account: account.into(),
            state: Mutex::new(LogState {
                clock: start,
                ..LogState::default()
            }),
            transaction_lookups: AtomicUsize::new(0),
            entry_fetches: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, LogState> {
        // No invariant spans a panic point, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a transaction under a human-form reference.
    pub fn record_transaction(
        &self,
        reference: &str,
        record: TransactionRecord,
    ) -> Result<(), ReferenceError> {
        let key = normalize(reference)?;
        self.state().transactions.insert(key.as_str().to_string(), record);
        Ok(())
    }

    /// Append a fully specified entry. Entries are kept in timestamp order.
    pub fn append_entry(&self, log_address: &str, entry: LogEntry) {
        let mut state = self.state();
        let entries = state.entries.entry(log_address.to_string()).or_default();
        entries.push(entry);
        entries.sort_by_key(|e| e.consensus_timestamp);
    }

    /// Append raw payload bytes at the next clock tick, bypassing transactions.
    ///
    /// Models foreign producers writing to the same log address.
    pub fn append_payload(&self, log_address: &str, payload: &[u8]) -> LogEntry {
        let mut state = self.state();
        let (_, consensus) = advance_clock(&mut state);
        push_entry(&mut state, log_address, consensus, payload)
    }

    /// Make every read fail with `error` (or succeed again with `None`).
    pub fn fail_reads(&self, error: Option<LogError>) {
        self.state().read_failure = error;
    }

    /// Make every write fail with `error` (or succeed again with `None`).
    pub fn fail_writes(&self, error: Option<LogError>) {
        self.state().write_failure = error;
    }

    /// Delay every read by `delay`.
    pub fn delay_reads(&self, delay: Option<Duration>) {
        self.state().read_delay = delay;
    }

    /// Number of entries stored under a log address.
    pub fn entry_count(&self, log_address: &str) -> usize {
        self.state().entries.get(log_address).map_or(0, Vec::len)
    }

    /// Number of `fetch_transaction` calls served.
    pub fn transaction_lookups(&self) -> usize {
        self.transaction_lookups.load(Ordering::Relaxed)
    }

    /// Number of `fetch_recent_entries` calls served.
    pub fn entry_fetches(&self) -> usize {
        self.entry_fetches.load(Ordering::Relaxed)
    }

    /// Number of `submit` calls received.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::Relaxed)
    }

    async fn before_read(&self) -> Result<(), LogError> {
        let (failure, delay) = {
            let state = self.state();
            (state.read_failure.clone(), state.read_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Tick the clock, returning `(valid_start, consensus)` for the new entry.
fn advance_clock(state: &mut LogState) -> (ConsensusTimestamp, ConsensusTimestamp) {
    let valid_start = state.clock;
    state.clock = ConsensusTimestamp::new(valid_start.seconds(), valid_start.nanos() + CLOCK_STEP_NANOS);
    let consensus =
        ConsensusTimestamp::new(valid_start.seconds(), valid_start.nanos() + CONSENSUS_LAG_NANOS);
    (valid_start, consensus)
}

fn push_entry(
    state: &mut LogState,
    log_address: &str,
    consensus: ConsensusTimestamp,
    payload: &[u8],
) -> LogEntry {
    let entries = state.entries.entry(log_address.to_string()).or_default();
    let entry = LogEntry {
        sequence_number: entries.last().map_or(1, |e| e.sequence_number + 1),
        consensus_timestamp: consensus,
        payload_base64: BASE64.encode(payload),
    };
    entries.push(entry.clone());
    entry
}

#[async_trait]
impl LogReader for InMemoryLog {
    async fn fetch_transaction(&self, key: &QueryKey) -> Result<TransactionRecord, LogError> {
        self.transaction_lookups.fetch_add(1, Ordering::Relaxed);
        self.before_read().await?;

        self.state()
            .transactions
            .get(key.as_str())
            .cloned()
            .ok_or(LogError::NotFound)
    }

    async fn fetch_recent_entries(
        &self,
        log_address: &str,
        page: &EntryPage,
    ) -> Result<Vec<LogEntry>, LogError> {
        self.entry_fetches.fetch_add(1, Ordering::Relaxed);
        self.before_read().await?;

        let state = self.state();
        let Some(entries) = state.entries.get(log_address) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .iter()
            .rev()
            .filter(|e| page.before.map_or(true, |before| e.consensus_timestamp < before))
            .take(page.limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LogWriter for InMemoryLog {
    async fn submit(&self, log_address: &str, payload: &[u8]) -> Result<SubmitReceipt, LogError> {
        self.submissions.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state();
        if let Some(error) = state.write_failure.clone() {
            return Err(error);
        }

        let (valid_start, consensus) = advance_clock(&mut state);
        let entry = push_entry(&mut state, log_address, consensus, payload);

        let transaction_id = format!("{}@{}", self.account, valid_start);
        let key = normalize(&transaction_id)
            .map_err(|e| LogError::InvalidResponse(e.to_string()))?;
        state.transactions.insert(
            key.as_str().to_string(),
            TransactionRecord {
                log_address: Some(log_address.to_string()),
                consensus_timestamp: Some(consensus),
            },
        );

        debug!(
            "Appended seq {} to {} as {}",
            entry.sequence_number, log_address, transaction_id
        );

        Ok(SubmitReceipt {
            transaction_id,
            status: "SUCCESS".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "0.0.6880493";

    #[tokio::test]
    async fn test_submit_then_resolve() {
        let log = InMemoryLog::new("0.0.1");
        let receipt = log.submit(TOPIC, b"hello").await.unwrap();
        assert_eq!(receipt.status, "SUCCESS");
        assert!(receipt.transaction_id.starts_with("0.0.1@"));

        let key = normalize(&receipt.transaction_id).unwrap();
        let record = log.fetch_transaction(&key).await.unwrap();
        assert_eq!(record.log_address.as_deref(), Some(TOPIC));

        let entries = log.fetch_recent_entries(TOPIC, &EntryPage::latest(10)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sequence_number, 1);
        assert_eq!(Some(entries[0].consensus_timestamp), record.consensus_timestamp);
        assert_eq!(BASE64.decode(&entries[0].payload_base64).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_consensus_differs_from_valid_start() {
        let log = InMemoryLog::new("0.0.1");
        let receipt = log.submit(TOPIC, b"x").await.unwrap();
        let (_, time) = receipt.transaction_id.split_once('@').unwrap();
        let valid_start: ConsensusTimestamp = time.parse().unwrap();

        let key = normalize(&receipt.transaction_id).unwrap();
        let record = log.fetch_transaction(&key).await.unwrap();
        assert!(record.consensus_timestamp.unwrap() > valid_start);
    }

    #[tokio::test]
    async fn test_entries_newest_first_with_paging() {
        let log = InMemoryLog::new("0.0.1");
        for i in 0..5u8 {
            log.submit(TOPIC, &[i]).await.unwrap();
        }

        let first = log.fetch_recent_entries(TOPIC, &EntryPage::latest(2)).await.unwrap();
        let seqs: Vec<u64> = first.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![5, 4]);

        let oldest = first[1].consensus_timestamp;
        let next = log
            .fetch_recent_entries(TOPIC, &EntryPage::older_than(2, oldest))
            .await
            .unwrap();
        let seqs: Vec<u64> = next.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![3, 2]);
        assert_eq!(log.entry_fetches(), 2);
    }

    #[tokio::test]
    async fn test_unknown_transaction_and_topic() {
        let log = InMemoryLog::new("0.0.1");
        let key = normalize("0.0.1@999.999").unwrap();
        assert_eq!(log.fetch_transaction(&key).await, Err(LogError::NotFound));
        assert!(log
            .fetch_recent_entries("0.0.404", &EntryPage::latest(10))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let log = InMemoryLog::new("0.0.1");
        log.fail_writes(Some(LogError::Unavailable("down".into())));
        assert!(log.submit(TOPIC, b"x").await.is_err());
        assert_eq!(log.entry_count(TOPIC), 0);
        assert_eq!(log.submissions(), 1);

        log.fail_writes(None);
        log.fail_reads(Some(LogError::Unavailable("down".into())));
        let receipt = log.submit(TOPIC, b"x").await.unwrap();
        let key = normalize(&receipt.transaction_id).unwrap();
        assert!(matches!(log.fetch_transaction(&key).await, Err(LogError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_seeded_transaction_and_entry() {
        let log = InMemoryLog::new("0.0.1");
        let ts: ConsensusTimestamp = "111.222".parse().unwrap();
        log.record_transaction(
            "0.0.1@111.222",
            TransactionRecord {
                log_address: Some(TOPIC.to_string()),
                consensus_timestamp: Some(ts),
            },
        )
        .unwrap();
        log.append_entry(
            TOPIC,
            LogEntry {
                sequence_number: 7,
                consensus_timestamp: ts,
                payload_base64: "e30=".into(),
            },
        );

        let record = log
            .fetch_transaction(&normalize("0.0.1@111.222").unwrap())
            .await
            .unwrap();
        assert_eq!(record.consensus_timestamp, Some(ts));
        assert_eq!(log.entry_count(TOPIC), 1);
        assert_eq!(log.transaction_lookups(), 1);
    }
}
