//! Segmentation coordinator.
//!
//! Folds the verdicts of every registered resolver into one cluster-wide
//! answer with logical AND. A resolver that fails, panics, or overruns its
//! deadline contributes `false`; the remaining resolvers still run.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use segwatch_common::{ResolverOutcome, SegmentReport, SegmentationError};

use crate::resolver::SegmentationResolver;

/// Runs resolvers in registration order and combines their verdicts
#[derive(Default)]
pub struct SegmentationCoordinator {
    resolvers: Vec<Arc<dyn SegmentationResolver>>,
    /// Overall deadline for a single resolver call
    resolve_timeout: Option<Duration>,
}

impl SegmentationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every resolver call; overruns count as `false`
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = Some(timeout);
        self
    }

    pub fn register(&mut self, resolver: Arc<dyn SegmentationResolver>) {
        tracing::debug!(resolver = %resolver.name(), "Resolver registered");
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Returns true if the local segment is valid. Never fails.
    pub async fn is_valid_segment(&self) -> bool {
        self.check().await.valid
    }

    /// Invoke every resolver and report each contribution
    pub async fn check(&self) -> SegmentReport {
        let mut outcomes = Vec::with_capacity(self.resolvers.len());

        // No short-circuit: each resolver emits its own warnings
        for resolver in &self.resolvers {
            outcomes.push(self.invoke(resolver.as_ref()).await);
        }

        let report = SegmentReport::from_outcomes(outcomes);

        if !report.valid {
            let failing: Vec<&str> = report
                .resolvers
                .iter()
                .filter(|r| !r.valid)
                .map(|r| r.name.as_str())
                .collect();
            tracing::info!(resolvers = ?failing, "Network segmentation detected!");
        }

        report
    }

    async fn invoke(&self, resolver: &dyn SegmentationResolver) -> ResolverOutcome {
        let started = Instant::now();
        let result = self.run_guarded(resolver).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(valid) => ResolverOutcome {
                name: resolver.name().to_string(),
                valid,
                error: None,
                elapsed_ms,
            },
            Err(e) => {
                tracing::warn!(
                    resolver = %resolver.name(),
                    error = %e,
                    transient = e.is_transient(),
                    "Resolver failed, counting segment as invalid"
                );
                ResolverOutcome {
                    name: resolver.name().to_string(),
                    valid: false,
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }

    /// Call a resolver, turning panics and deadline overruns into errors
    async fn run_guarded(
        &self,
        resolver: &dyn SegmentationResolver,
    ) -> Result<bool, SegmentationError> {
        let call = AssertUnwindSafe(resolver.is_valid_segment()).catch_unwind();

        let caught = match self.resolve_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SegmentationError::Timeout(resolver.name().to_string()))?,
            None => call.await,
        };

        caught.map_err(|panic| SegmentationError::resolver(resolver.name(), panic_message(&*panic)))?
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
