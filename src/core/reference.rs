//! Transaction Reference Normalization
//!
//! Users copy transaction ids as `<account>@<seconds>.<nanos>`.
//! The log service's query API addresses them as `<account>-<seconds>-<nanos>`.
//! The service does no fuzzy matching, so this conversion must be exact.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

/// Characters left unescaped in a path segment (`encodeURIComponent` set).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Reference normalization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// Reference has no `@` between account and timestamp.
    #[error("malformed reference {0:?}: expected <account>@<seconds>.<nanos>")]
    Malformed(String),
}

/// Query key for the log service's transaction lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(String);

impl QueryKey {
    /// Decoded form, `<account>-<seconds>-<nanos>`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form for use as a single URL path segment.
    pub fn encoded(&self) -> String {
        encode_path_segment(&self.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a human-copied transaction reference to a query key.
///
/// Splits on the first `@`, then the remainder on the first `.`.
/// A missing fractional part becomes nanos `"0"`.
pub fn normalize(reference: &str) -> Result<QueryKey, ReferenceError> {
    let reference = reference.trim();
    let (account, time) = reference
        .split_once('@')
        .ok_or_else(|| ReferenceError::Malformed(reference.to_string()))?;
    let (seconds, nanos) = time.split_once('.').unwrap_or((time, "0"));

    Ok(QueryKey(format!("{account}-{seconds}-{nanos}")))
}

/// Percent-encode a value for one URL path segment.
pub fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}
