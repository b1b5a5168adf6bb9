//! Application state and shared resources.

use std::sync::Arc;
use std::time::Instant;

use segwatch_common::SegmentationError;

use crate::config::AppConfig;
use crate::coordinator::SegmentationCoordinator;
use crate::resolver::{Probe, ReachabilityResolver, SegmentationResolver};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Resolver fold shared by the HTTP handlers and the monitor
    pub coordinator: Arc<SegmentationCoordinator>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, coordinator: Arc<SegmentationCoordinator>) -> Self {
        Self {
            config,
            coordinator,
            started_at: Instant::now(),
        }
    }
}

/// Build one reachability resolver per configured entry.
///
/// Any invalid resolver configuration aborts the whole build.
pub fn build_coordinator(
    config: &AppConfig,
    probe: Arc<dyn Probe>,
) -> Result<SegmentationCoordinator, SegmentationError> {
    let mut coordinator = SegmentationCoordinator::new();
    if let Some(timeout) = config.resolve_timeout() {
        coordinator = coordinator.with_resolve_timeout(timeout);
    }

    for (index, resolver_config) in config.resolvers.iter().enumerate() {
        let mut resolver_config = resolver_config.clone();
        if resolver_config.name.is_none() {
            resolver_config.name = Some(format!("resolver-{index}"));
        }

        let resolver = ReachabilityResolver::new(resolver_config, probe.clone())?;

        tracing::info!(
            resolver = %resolver.name(),
            interface = %resolver.config().network_interface,
            hosts = resolver.config().topology_hosts.len(),
            consistency = %resolver.config().consistency,
            "Reachability resolver configured"
        );

        coordinator.register(Arc::new(resolver));
    }

    if coordinator.is_empty() {
        tracing::warn!("No resolvers configured, the segment will always be reported valid");
    }

    Ok(coordinator)
}
