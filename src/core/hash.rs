//! Document Content Hashing
//!
//! Provides the fingerprint anchored for every document:
//! - SHA-256 over the exact document bytes (no normalization)
//! - Lowercase hex wire form, 64 characters
//! - Streaming hasher for callers reading large files in chunks

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Digest length in bytes (256 bits).
pub const CONTENT_HASH_LEN: usize = 32;

/// SHA-256 fingerprint of a document's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; CONTENT_HASH_LEN]);

/// Error parsing a hex-encoded content hash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentHashError {
    /// Input is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Input decodes to the wrong number of bytes.
    #[error("expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Decoded byte length.
        got: usize,
    },
}

impl ContentHash {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; CONTENT_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; CONTENT_HASH_LEN] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex. Upper and lower case are both accepted.
    pub fn from_hex(s: &str) -> Result<Self, ContentHashError> {
        let bytes = hex::decode(s).map_err(|e| ContentHashError::InvalidHex(e.to_string()))?;
        if bytes.len() != CONTENT_HASH_LEN {
            return Err(ContentHashError::InvalidLength {
                expected: CONTENT_HASH_LEN,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; CONTENT_HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = ContentHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ContentHashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}

/// Incremental document hasher.
///
/// Feeding the same bytes in any chunking yields the same hash as
/// [`hash_document`] over the concatenation.
#[derive(Default)]
pub struct DocumentHasher {
    hasher: Sha256,
    len: u64,
}

impl DocumentHasher {
    /// Create an empty hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of document bytes.
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.len += bytes.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if no bytes have been fed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> ContentHash {
        ContentHash(self.hasher.finalize().into())
    }
}

/// Hash a complete document.
pub fn hash_document(bytes: &[u8]) -> ContentHash {
    let mut hasher = DocumentHasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================
