//! Segmentation resolvers.
//!
//! A resolver decides whether the local node still sits in a healthy cluster
//! segment. Implements:
//! - Reachability probing of configured topology hosts
//! - ONE / QUORUM / ALL consistency evaluation

mod probe;
mod reachable;

pub use probe::{EchoProbe, Probe};
pub use reachable::{ReachabilityResolver, ResolverConfig};

use async_trait::async_trait;
use segwatch_common::SegmentationError;

/// One independent segmentation detection strategy
#[async_trait]
pub trait SegmentationResolver: Send + Sync {
    /// Label used in logs and reports
    fn name(&self) -> &str;

    /// Returns true if the local segment is considered valid right now
    async fn is_valid_segment(&self) -> Result<bool, SegmentationError>;
}
