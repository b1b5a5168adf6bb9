//! Background segmentation monitor.
//!
//! Re-runs the coordinator on a fixed interval, logs verdict transitions and
//! applies the configured segmentation policy.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use segwatch_common::SegmentationPolicy;

use crate::coordinator::SegmentationCoordinator;

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Process shutdown was requested elsewhere
    Shutdown,
    /// Segmentation detected under the `stop` policy
    Segmented,
}

/// Periodic segmentation check loop.
///
/// Under [`SegmentationPolicy::Stop`] a negative verdict broadcasts shutdown
/// to the rest of the process and ends the loop.
pub async fn monitor_worker(
    coordinator: Arc<SegmentationCoordinator>,
    interval: Duration,
    policy: SegmentationPolicy,
    shutdown_tx: broadcast::Sender<()>,
) -> MonitorExit {
    let mut shutdown = shutdown_tx.subscribe();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_valid: Option<bool> = None;

    tracing::info!(
        interval = ?interval,
        policy = ?policy,
        resolvers = coordinator.len(),
        "🛰️ Segmentation monitor started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = coordinator.check().await;
                log_transition(last_valid, report.valid);
                last_valid = Some(report.valid);

                if !report.valid && policy == SegmentationPolicy::Stop {
                    tracing::error!("Segmentation policy is 'stop', shutting down to avoid split-brain");
                    let _ = shutdown_tx.send(());
                    return MonitorExit::Segmented;
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("🛰️ Segmentation monitor shutting down");
                return MonitorExit::Shutdown;
            }
        }
    }
}

fn log_transition(previous: Option<bool>, current: bool) {
    match (previous, current) {
        (None, true) => tracing::info!("✅ Segment valid"),
        (None, false) => tracing::warn!("⚠️ Node starts out SEGMENTED from the cluster"),
        (Some(true), false) => tracing::error!("⚠️ Node is now SEGMENTED from the cluster"),
        (Some(false), true) => tracing::info!("✅ Node rejoined a valid segment"),
        _ => tracing::debug!(valid = current, "Segment status unchanged"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SegmentationResolver;
    use async_trait::async_trait;
    use segwatch_common::SegmentationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        valid: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SegmentationResolver for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn is_valid_segment(&self) -> Result<bool, SegmentationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.valid)
        }
    }

    fn setup(valid: bool) -> (Arc<SegmentationCoordinator>, Arc<Fixed>) {
        let resolver = Arc::new(Fixed {
            valid,
            calls: AtomicUsize::new(0),
        });
        let mut coordinator = SegmentationCoordinator::new();
        coordinator.register(resolver.clone());
        (Arc::new(coordinator), resolver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_policy_broadcasts_shutdown() {
        let (coordinator, _) = setup(false);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let exit = monitor_worker(
            coordinator,
            Duration::from_secs(5),
            SegmentationPolicy::Stop,
            shutdown_tx,
        )
        .await;

        assert_eq!(exit, MonitorExit::Segmented);
        assert!(shutdown_rx.recv().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_noop_policy_keeps_checking() {
        let (coordinator, resolver) = setup(false);
        let (shutdown_tx, _) = broadcast::channel(1);

        let handle = tokio::spawn(monitor_worker(
            coordinator,
            Duration::from_secs(5),
            SegmentationPolicy::Noop,
            shutdown_tx.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(12)).await;
        shutdown_tx.send(()).unwrap();

        assert_eq!(handle.await.unwrap(), MonitorExit::Shutdown);
        // Ticks at 0s, 5s and 10s
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_segment_survives_stop_policy() {
        let (coordinator, resolver) = setup(true);
        let (shutdown_tx, _) = broadcast::channel(1);

        let handle = tokio::spawn(monitor_worker(
            coordinator,
            Duration::from_secs(1),
            SegmentationPolicy::Stop,
            shutdown_tx.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        shutdown_tx.send(()).unwrap();

        assert_eq!(handle.await.unwrap(), MonitorExit::Shutdown);
        assert!(resolver.calls.load(Ordering::SeqCst) >= 3);
    }
}
