//! Runtime Configuration
//!
//! Read once from the environment at startup:
//!
//! | variable               | default                                  |
//! |------------------------|------------------------------------------|
//! | `MIRROR_NODE`          | `https://testnet.mirrornode.hedera.com`  |
//! | `TOPIC_ID`             | `0.0.6880493`                            |
//! | `ACCOUNT_ID`           | none, required for anchoring             |
//! | `SUBMIT_GATEWAY`       | none, required for anchoring             |
//! | `VERIFY_PAGE_SIZE`     | `100`                                    |
//! | `VERIFY_MAX_PAGES`     | `5`                                      |
//! | `REQUEST_TIMEOUT_SECS` | `30`                                     |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::log::mirror::{DEFAULT_MIRROR_NODE, MAX_PAGE_LIMIT};
use crate::verify::VerifyConfig;

/// Log address used when `TOPIC_ID` is unset.
pub const DEFAULT_TOPIC_ID: &str = "0.0.6880493";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable needed for this operation is unset.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set to an unusable value.
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

/// Notary configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryConfig {
    /// Base URL of the log read service.
    pub mirror_node: String,
    /// Log address (topic) documents are anchored to.
    pub topic_id: String,
    /// Account id submissions are issued under.
    pub account_id: Option<String>,
    /// Base URL of the submission relay.
    pub submit_gateway: Option<String>,
    /// Entries per page when searching for a match.
    pub page_size: usize,
    /// Pages searched before giving up.
    pub max_pages: usize,
    /// Per-request and per-call timeout.
    pub request_timeout: Duration,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        let verify = VerifyConfig::default();
        Self {
            mirror_node: DEFAULT_MIRROR_NODE.to_string(),
            topic_id: DEFAULT_TOPIC_ID.to_string(),
            account_id: None,
            submit_gateway: None,
            page_size: verify.page_size,
            max_pages: verify.max_pages,
            request_timeout: verify.timeout,
        }
    }
}

impl NotaryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            mirror_node: text("MIRROR_NODE").unwrap_or(defaults.mirror_node),
            topic_id: text("TOPIC_ID").unwrap_or(defaults.topic_id),
            account_id: text("ACCOUNT_ID"),
            submit_gateway: text("SUBMIT_GATEWAY"),
            page_size: parse_or("VERIFY_PAGE_SIZE", text("VERIFY_PAGE_SIZE"), defaults.page_size)?,
            max_pages: parse_or("VERIFY_MAX_PAGES", text("VERIFY_MAX_PAGES"), defaults.max_pages)?,
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                text("REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check numeric bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_LIMIT {
            return Err(ConfigError::Invalid {
                var: "VERIFY_PAGE_SIZE",
                value: self.page_size.to_string(),
                reason: format!("must be between 1 and {MAX_PAGE_LIMIT}"),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                var: "VERIFY_MAX_PAGES",
                value: self.max_pages.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Account id, required for anchoring.
    pub fn require_account(&self) -> Result<&str, ConfigError> {
        self.account_id.as_deref().ok_or(ConfigError::Missing("ACCOUNT_ID"))
    }

    /// Submission relay, required for anchoring.
    pub fn require_gateway(&self) -> Result<&str, ConfigError> {
        self.submit_gateway.as_deref().ok_or(ConfigError::Missing("SUBMIT_GATEWAY"))
    }

    /// Verification tuning derived from this configuration.
    pub fn verify_config(&self) -> VerifyConfig {
        VerifyConfig {
            page_size: self.page_size,
            max_pages: self.max_pages,
            timeout: self.request_timeout,
            ..VerifyConfig::default()
        }
    }
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<NotaryConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NotaryConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, NotaryConfig::default());
        assert_eq!(config.mirror_node, "https://testnet.mirrornode.hedera.com");
        assert_eq!(config.topic_id, "0.0.6880493");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MIRROR_NODE", "http://localhost:5551"),
            ("TOPIC_ID", "0.0.42"),
            ("ACCOUNT_ID", "0.0.7"),
            ("SUBMIT_GATEWAY", "http://localhost:8080"),
            ("VERIFY_PAGE_SIZE", "25"),
            ("VERIFY_MAX_PAGES", "3"),
            ("REQUEST_TIMEOUT_SECS", "5"),
        ])
        .unwrap();

        assert_eq!(config.mirror_node, "http://localhost:5551");
        assert_eq!(config.topic_id, "0.0.42");
        assert_eq!(config.require_account(), Ok("0.0.7"));
        assert_eq!(config.require_gateway(), Ok("http://localhost:8080"));

        let verify = config.verify_config();
        assert_eq!(verify.page_size, 25);
        assert_eq!(verify.max_pages, 3);
        assert_eq!(verify.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = load(&[("TOPIC_ID", "  "), ("ACCOUNT_ID", "")]).unwrap();
        assert_eq!(config.topic_id, DEFAULT_TOPIC_ID);
        assert_eq!(config.require_account(), Err(ConfigError::Missing("ACCOUNT_ID")));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = load(&[("VERIFY_PAGE_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "VERIFY_PAGE_SIZE", .. }));

        let err = load(&[("VERIFY_PAGE_SIZE", "500")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "VERIFY_PAGE_SIZE", .. }));

        let err = load(&[("VERIFY_MAX_PAGES", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "VERIFY_MAX_PAGES", .. }));

        let err = load(&[("REQUEST_TIMEOUT_SECS", "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "REQUEST_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn test_missing_gateway() {
        let config = load(&[]).unwrap();
        let err = config.require_gateway().unwrap_err();
        assert_eq!(err.to_string(), "SUBMIT_GATEWAY is not set");
    }
}
