//! Core types shared across Segwatch components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Consistency policy of a resolver.
/// Controls how many configured hosts must be reachable for the local
/// segment to be considered valid.
///
/// - ONE: at least one host
/// - QUORUM: strictly more than half of the hosts
/// - ALL: every host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Consistency {
    #[serde(alias = "one")]
    One,
    #[default]
    #[serde(alias = "quorum")]
    Quorum,
    #[serde(alias = "all")]
    All,
}

impl Consistency {
    /// Decide the verdict from the reachable count out of `total` hosts.
    ///
    /// Quorum is "more than half" with integer division, so 4 hosts need 3.
    pub fn is_satisfied(&self, reachable: usize, total: usize) -> bool {
        match self {
            Self::One => reachable >= 1,
            Self::Quorum => reachable > total / 2,
            Self::All => reachable == total,
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::One => "ONE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
        };
        f.write_str(s)
    }
}

/// What the daemon does when segmentation is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationPolicy {
    /// Report only, keep running
    #[default]
    Noop,
    /// Shut the process down
    Stop,
}

impl FromStr for SegmentationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noop" => Ok(Self::Noop),
            "stop" => Ok(Self::Stop),
            other => Err(format!("unknown segmentation policy '{other}' (expected noop or stop)")),
        }
    }
}

/// Outcome of probing a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReachability {
    pub host: String,
    pub reachable: bool,
}

/// Per-call reachability of every configured host, in configured order.
///
/// Built fresh for each resolution and dropped once the verdict is computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReachabilityReport {
    entries: Vec<HostReachability>,
}

impl ReachabilityReport {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Record the outcome for a host
    pub fn record(&mut self, host: impl Into<String>, reachable: bool) {
        self.entries.push(HostReachability {
            host: host.into(),
            reachable,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reachable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.reachable).count()
    }

    /// Hosts that did not answer, in configured order
    pub fn unreachable_hosts(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.reachable)
            .map(|e| e.host.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostReachability> {
        self.entries.iter()
    }

    /// Apply a consistency policy to this report
    pub fn verdict(&self, consistency: Consistency) -> bool {
        consistency.is_satisfied(self.reachable_count(), self.len())
    }
}

/// Contribution of one resolver to a coordinated check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverOutcome {
    /// Resolver label
    pub name: String,

    /// Verdict contributed (false when the resolver failed)
    pub valid: bool,

    /// Failure description, if the resolver failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall time spent in the resolver
    pub elapsed_ms: u64,
}

/// Result of one coordinated segmentation check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentReport {
    /// Conjunction of all resolver verdicts
    pub valid: bool,

    /// Per-resolver outcomes, in registration order
    pub resolvers: Vec<ResolverOutcome>,

    /// Unix timestamp of the check
    pub checked_at: i64,
}

impl SegmentReport {
    /// Fold resolver outcomes into a report. An empty set is valid.
    pub fn from_outcomes(resolvers: Vec<ResolverOutcome>) -> Self {
        let valid = resolvers.iter().fold(true, |acc, r| acc && r.valid);
        Self {
            valid,
            resolvers,
            checked_at: chrono::Utc::now().timestamp(),
        }
    }
}
