//! Core primitives.
//!
//! Pure, side-effect-free building blocks shared by the anchor and verify
//! paths: document hashing, consensus timestamps and reference normalization.

pub mod hash;
pub mod reference;
pub mod timestamp;

// Re-export core types
pub use hash::{hash_document, ContentHash, ContentHashError, DocumentHasher};
pub use reference::{normalize, QueryKey, ReferenceError};
pub use timestamp::{ConsensusTimestamp, TimestampParseError};
