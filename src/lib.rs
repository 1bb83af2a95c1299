//! # Proof Anchor
//!
//! Anchors document fingerprints in an append-only consensus log and later
//! proves, from a transaction reference alone, that a given fingerprint was
//! anchored.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF ANCHOR                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Pure primitives                         │
//! │  ├── hash.rs      - SHA-256 content fingerprint             │
//! │  ├── reference.rs - tx reference -> query key               │
//! │  └── timestamp.rs - consensus timestamps                    │
//! │                                                             │
//! │  log/             - Log service boundary                    │
//! │  ├── mirror.rs    - HTTP reads                              │
//! │  ├── gateway.rs   - HTTP submission relay                   │
//! │  └── memory.rs    - in-memory log                           │
//! │                                                             │
//! │  proof/           - Anchor path                             │
//! │  verify/          - Verify path                             │
//! │  notary.rs        - anchor / verify facade                  │
//! │  config.rs        - environment configuration               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Verification Guarantee
//!
//! A verdict is `Valid` only if the log service vouches for the link between
//! the reference and the entry: the entry carries the transaction's exact
//! consensus timestamp, or its payload names the transaction id verbatim.
//! Verification only reads, so it can be repeated freely.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod log;
pub mod notary;
pub mod proof;
pub mod verify;

// Re-export commonly used types
pub use config::{ConfigError, NotaryConfig};
pub use crate::core::{hash_document, normalize, ConsensusTimestamp, ContentHash, QueryKey};
pub use log::{InMemoryLog, LogError, LogReader, LogWriter};
pub use notary::{Anchored, Notary};
pub use proof::{AnchorError, AnchorReference, ProofRecord};
pub use verify::{FailureReason, Verdict, VerifyConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
