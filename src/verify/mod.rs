//! Verification
//!
//! Turns a transaction reference into a verdict by reading the log:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    VERIFY PATH                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  orchestrator.rs - normalize, resolve, page, match, decode  │
//! │  matcher.rs      - entry selection rules                    │
//! │  verdict.rs      - Verdict, Evidence, FailureReason         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod matcher;
pub mod orchestrator;
pub mod verdict;

// Re-export key types
pub use matcher::{match_entry, Match, MatchRule};
pub use orchestrator::{VerificationOrchestrator, VerifyConfig};
pub use verdict::{EntrySample, Evidence, FailureReason, Rejection, Verdict, VerifyStage};
