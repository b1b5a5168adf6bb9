//! Common error types for Segwatch components.

use thiserror::Error;

/// Errors raised while resolving segment validity
#[derive(Debug, Error)]
pub enum SegmentationError {
    /// Missing or invalid configuration (e.g. an empty host list)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single host probe failed; absorbed as "unreachable"
    #[error("Probe failed for {host}: {reason}")]
    Probe { host: String, reason: String },

    /// A resolver failed as a whole; absorbed by the coordinator as `false`
    #[error("Resolver '{name}' failed: {reason}")]
    Resolver { name: String, reason: String },

    /// A resolver did not finish before its deadline
    #[error("Resolver '{0}' timed out")]
    Timeout(String),
}

impl SegmentationError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for a resolver failure
    pub fn resolver(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Resolver {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the next resolution call may succeed without
    /// operator intervention
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
