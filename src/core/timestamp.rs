//! Consensus Timestamps
//!
//! The log service stamps every accepted entry with `<seconds>.<nanos>`.
//! The fractional part is a decimal fraction of a second, so `111.5` and
//! `111.500000000` name the same instant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nanoseconds per second.
const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Maximum digits in the fractional part.
const MAX_FRACTION_DIGITS: usize = 9;

/// Log-assigned acceptance time of an entry.
///
/// Ordering is chronological.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsensusTimestamp {
    seconds: u64,
    nanos: u32,
}

/// Error parsing a consensus timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid consensus timestamp {input:?}: {reason}")]
pub struct TimestampParseError {
    input: String,
    reason: &'static str,
}

impl TimestampParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl ConsensusTimestamp {
    /// Create from whole seconds and nanoseconds.
    ///
    /// Nanoseconds beyond one second carry into `seconds`.
    pub fn new(seconds: u64, nanos: u32) -> Self {
        Self {
            seconds: seconds.saturating_add(u64::from(nanos / NANOS_PER_SEC)),
            nanos: nanos % NANOS_PER_SEC,
        }
    }

    /// Whole seconds since the Unix epoch.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// Nanoseconds within the second.
    pub fn nanos(&self) -> u32 {
        self.nanos
    }
}

impl FromStr for ConsensusTimestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (secs, frac) = match s.split_once('.') {
            Some((secs, frac)) => (secs, Some(frac)),
            None => (s, None),
        };

        if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimestampParseError::new(s, "seconds must be decimal digits"));
        }
        let seconds = secs
            .parse::<u64>()
            .map_err(|_| TimestampParseError::new(s, "seconds out of range"))?;

        let nanos = match frac {
            None => 0,
            Some(frac) => {
                if frac.is_empty() || frac.len() > MAX_FRACTION_DIGITS {
                    return Err(TimestampParseError::new(s, "fraction must have 1-9 digits"));
                }
                if !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(TimestampParseError::new(s, "fraction must be decimal digits"));
                }
                // Right-pad to nanosecond precision
                let scale = 10u32.pow((MAX_FRACTION_DIGITS - frac.len()) as u32);
                frac.parse::<u32>()
                    .map_err(|_| TimestampParseError::new(s, "fraction out of range"))?
                    * scale
            }
        };

        Ok(Self { seconds, nanos })
    }
}

impl fmt::Display for ConsensusTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl TryFrom<String> for ConsensusTimestamp {
    type Error = TimestampParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConsensusTimestamp> for String {
    fn from(ts: ConsensusTimestamp) -> Self {
        ts.to_string()
    }
}
