//! Reachability-based segmentation resolver.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use segwatch_common::constants::{
    DEFAULT_NETWORK_INTERFACE, DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_TTL,
};
use segwatch_common::{Consistency, ReachabilityReport, SegmentationError};

use super::probe::{Probe, ProbeSettings};
use super::SegmentationResolver;

const DEFAULT_RESOLVER_NAME: &str = "reachability";

/// Configuration of one reachability resolver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResolverConfig {
    /// Label for logs and reports
    #[serde(default)]
    pub name: Option<String>,

    /// Interface used for every probe of this resolver
    #[serde(default = "default_interface", alias = "networkInterface")]
    pub network_interface: String,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_timeout_ms", alias = "timeoutMs")]
    pub timeout_ms: u64,

    /// Hop limit (0 = OS default)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Remote port probed on each host
    #[serde(default = "default_probe_port", alias = "probePort")]
    pub probe_port: u16,

    /// Hosts to probe, in order. Required and non-empty.
    #[serde(default, alias = "topologyHosts")]
    pub topology_hosts: Vec<String>,

    /// How many hosts must answer
    #[serde(default)]
    pub consistency: Consistency,
}

fn default_interface() -> String { DEFAULT_NETWORK_INTERFACE.to_string() }
fn default_timeout_ms() -> u64 { DEFAULT_PROBE_TIMEOUT_MS }
fn default_ttl() -> u32 { DEFAULT_TTL }
fn default_probe_port() -> u16 { DEFAULT_PROBE_PORT }

impl ResolverConfig {
    /// Config with defaults for everything but the host list
    pub fn new(topology_hosts: Vec<String>) -> Self {
        Self {
            name: None,
            network_interface: default_interface(),
            timeout_ms: default_timeout_ms(),
            ttl: default_ttl(),
            probe_port: default_probe_port(),
            topology_hosts,
            consistency: Consistency::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check the configuration before any probing happens
    pub fn validate(&self) -> Result<(), SegmentationError> {
        if self.topology_hosts.is_empty() {
            return Err(SegmentationError::config(
                "topologyHosts must list at least one host",
            ));
        }

        let mut seen = HashSet::with_capacity(self.topology_hosts.len());
        for host in &self.topology_hosts {
            if host.trim().is_empty() {
                return Err(SegmentationError::config("topologyHosts contains a blank host"));
            }
            if !seen.insert(host.as_str()) {
                return Err(SegmentationError::config(format!(
                    "topologyHosts lists {host} more than once"
                )));
            }
        }

        if self.network_interface.is_empty() || self.network_interface.contains('/') {
            return Err(SegmentationError::config(format!(
                "invalid networkInterface '{}'",
                self.network_interface
            )));
        }

        if self.timeout_ms == 0 {
            return Err(SegmentationError::config("timeoutMs must be greater than zero"));
        }

        Ok(())
    }

    fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            interface: self.network_interface.clone(),
            ttl: self.ttl,
            timeout: self.timeout(),
            port: self.probe_port,
        }
    }
}

/// Probes a fixed set of hosts and applies a consistency policy.
///
/// Every call probes every host exactly once, concurrently, and keeps nothing
/// afterwards. Probe errors never escape: a host that cannot be probed is
/// simply unreachable for that call.
pub struct ReachabilityResolver {
    name: String,
    config: ResolverConfig,
    probe: Arc<dyn Probe>,
}

impl ReachabilityResolver {
    /// Validate `config` and build a resolver around `probe`
    pub fn new(config: ResolverConfig, probe: Arc<dyn Probe>) -> Result<Self, SegmentationError> {
        config.validate()?;

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_RESOLVER_NAME.to_string());

        Ok(Self {
            name,
            config,
            probe,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Probe all configured hosts and collect the outcomes in configured order
    pub async fn resolve(&self) -> ReachabilityReport {
        let settings = self.config.probe_settings();

        let outcomes = join_all(
            self.config
                .topology_hosts
                .iter()
                .map(|host| self.probe_host(host, &settings)),
        )
        .await;

        let mut report = ReachabilityReport::with_capacity(outcomes.len());
        for (host, reachable) in self.config.topology_hosts.iter().zip(outcomes) {
            report.record(host.as_str(), reachable);
        }

        report
    }

    async fn probe_host(&self, host: &str, settings: &ProbeSettings) -> bool {
        match self.probe.probe(host, settings).await {
            Ok(reachable) => reachable,
            Err(e) => {
                let failure = SegmentationError::Probe {
                    host: host.to_string(),
                    reason: format!("{e:#}"),
                };
                tracing::debug!(
                    resolver = %self.name,
                    error = %failure,
                    "Counting host as unreachable"
                );
                false
            }
        }
    }
}

#[async_trait]
impl SegmentationResolver for ReachabilityResolver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_valid_segment(&self) -> Result<bool, SegmentationError> {
        let report = self.resolve().await;

        for host in report.unreachable_hosts() {
            tracing::warn!(
                resolver = %self.name,
                host = %host,
                interface = %self.config.network_interface,
                "Segmentation alert: detected unreachable host"
            );
        }

        let valid = report.verdict(self.config.consistency);

        tracing::debug!(
            resolver = %self.name,
            reachable = report.reachable_count(),
            total = report.len(),
            consistency = %self.config.consistency,
            valid,
            "Reachability resolved"
        );

        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio_test::assert_ok;
    use tracing_test::traced_test;

    /// Probe with canned answers; unknown hosts fail like a broken interface
    #[derive(Default)]
    struct ScriptedProbe {
        answers: HashMap<String, bool>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedProbe {
        fn new(answers: &[(&str, bool)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(h, r)| (h.to_string(), *r))
                    .collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, host: &str, _settings: &ProbeSettings) -> anyhow::Result<bool> {
            self.calls.lock().unwrap().push(host.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answers
                .get(host)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("Network interface eth0 is down"))
        }
    }

    fn hosts(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("10.0.0.{i}")).collect()
    }

    fn build(
        n: usize,
        reachable: usize,
        consistency: Consistency,
    ) -> (ReachabilityResolver, Arc<ScriptedProbe>) {
        let answers: Vec<(String, bool)> = hosts(n)
            .into_iter()
            .enumerate()
            .map(|(i, h)| (h, i < reachable))
            .collect();
        let answers: Vec<(&str, bool)> = answers.iter().map(|(h, r)| (h.as_str(), *r)).collect();
        let probe = Arc::new(ScriptedProbe::new(&answers));

        let config = ResolverConfig {
            consistency,
            ..ResolverConfig::new(hosts(n))
        };
        let resolver = ReachabilityResolver::new(config, probe.clone()).unwrap();
        (resolver, probe)
    }

    #[tokio::test]
    async fn test_quorum_three_hosts_two_reachable() {
        let (resolver, _) = build(3, 2, Consistency::Quorum);
        assert!(assert_ok!(resolver.is_valid_segment().await));
    }

    #[tokio::test]
    async fn test_quorum_three_hosts_one_reachable() {
        let (resolver, _) = build(3, 1, Consistency::Quorum);
        assert!(!assert_ok!(resolver.is_valid_segment().await));
    }

    #[tokio::test]
    async fn test_quorum_even_split_is_not_enough() {
        let (resolver, _) = build(4, 2, Consistency::Quorum);
        assert!(!assert_ok!(resolver.is_valid_segment().await));

        let (resolver, _) = build(4, 3, Consistency::Quorum);
        assert!(assert_ok!(resolver.is_valid_segment().await));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_warns_once_per_unreachable_host() {
        let (resolver, _) = build(3, 1, Consistency::Quorum);
        assert!(!assert_ok!(resolver.is_valid_segment().await));

        logs_assert(|lines: &[&str]| {
            let warnings: Vec<_> = lines
                .iter()
                .filter(|line| line.contains("detected unreachable host"))
                .collect();

            if warnings.len() != 2 {
                return Err(format!("expected 2 warnings, got {}", warnings.len()));
            }
            if !warnings.iter().all(|line| line.contains("WARN")) {
                return Err("unreachable host logged below WARN".to_string());
            }
            for host in ["10.0.0.2", "10.0.0.3"] {
                let hits = warnings
                    .iter()
                    .filter(|line| line.contains(&format!("host={host}")))
                    .count();
                if hits != 1 {
                    return Err(format!("{host} named in {hits} warnings"));
                }
            }
            if warnings.iter().any(|line| line.contains("host=10.0.0.1 ")) {
                return Err("reachable host reported".to_string());
            }
            Ok(())
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_no_warnings_when_all_reachable() {
        let (resolver, _) = build(3, 3, Consistency::All);
        assert!(assert_ok!(resolver.is_valid_segment().await));

        assert!(!logs_contain("detected unreachable host"));
    }

    #[tokio::test]
    async fn test_all_four_hosts_three_reachable() {
        let (resolver, _) = build(4, 3, Consistency::All);
        assert!(!assert_ok!(resolver.is_valid_segment().await));
    }

    #[tokio::test]
    async fn test_one_single_host_unreachable() {
        let (resolver, _) = build(1, 0, Consistency::One);
        assert!(!assert_ok!(resolver.is_valid_segment().await));
    }

    #[tokio::test]
    async fn test_probe_errors_count_as_unreachable() {
        // 10.0.0.3 has no scripted answer, so its probe errors out
        let probe = Arc::new(ScriptedProbe::new(&[("10.0.0.1", true), ("10.0.0.2", true)]));
        let config = ResolverConfig {
            consistency: Consistency::All,
            ..ResolverConfig::new(hosts(3))
        };
        let resolver = ReachabilityResolver::new(config, probe).unwrap();

        let report = resolver.resolve().await;
        assert_eq!(report.len(), 3);
        assert_eq!(report.unreachable_hosts().collect::<Vec<_>>(), vec!["10.0.0.3"]);

        // The error stays inside the resolver
        assert!(!assert_ok!(resolver.is_valid_segment().await));
    }

    #[tokio::test]
    async fn test_every_host_probed_once_in_order() {
        let (resolver, probe) = build(5, 1, Consistency::Quorum);

        let report = resolver.resolve().await;
        let reported: Vec<_> = report.iter().map(|e| e.host.clone()).collect();

        assert_eq!(reported, hosts(5));
        assert_eq!(probe.calls(), hosts(5));
    }

    #[tokio::test]
    async fn test_calls_are_independent() {
        let (resolver, probe) = build(3, 2, Consistency::Quorum);

        let first = assert_ok!(resolver.is_valid_segment().await);
        let second = assert_ok!(resolver.is_valid_segment().await);

        assert_eq!(first, second);
        assert_eq!(probe.calls().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_concurrently() {
        let probe = Arc::new(ScriptedProbe {
            delay: Some(Duration::from_millis(200)),
            ..ScriptedProbe::new(&[("10.0.0.1", true), ("10.0.0.2", true), ("10.0.0.3", true)])
        });
        let resolver = ReachabilityResolver::new(ResolverConfig::new(hosts(3)), probe).unwrap();

        let started = tokio::time::Instant::now();
        resolver.resolve().await;

        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_empty_host_list_is_config_error() {
        let probe = Arc::new(ScriptedProbe::default());
        let result = ReachabilityResolver::new(ResolverConfig::new(vec![]), probe.clone());

        assert!(matches!(result, Err(SegmentationError::Config(_))));
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let duplicate = ResolverConfig::new(vec!["a".into(), "a".into()]);
        assert!(matches!(duplicate.validate(), Err(SegmentationError::Config(_))));

        let blank = ResolverConfig::new(vec!["  ".into()]);
        assert!(matches!(blank.validate(), Err(SegmentationError::Config(_))));

        let bad_iface = ResolverConfig {
            network_interface: "../eth0".into(),
            ..ResolverConfig::new(vec!["a".into()])
        };
        assert!(matches!(bad_iface.validate(), Err(SegmentationError::Config(_))));

        let zero_timeout = ResolverConfig {
            timeout_ms: 0,
            ..ResolverConfig::new(vec!["a".into()])
        };
        assert!(matches!(zero_timeout.validate(), Err(SegmentationError::Config(_))));
    }

    #[test]
    fn test_config_defaults() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"topologyHosts": ["10.0.0.1", "10.0.0.2"]}"#).unwrap();

        assert_eq!(config.network_interface, "eth0");
        assert_eq!(config.timeout(), Duration::from_millis(200));
        assert_eq!(config.ttl, 0);
        assert_eq!(config.probe_port, 7);
        assert_eq!(config.consistency, Consistency::Quorum);
        assert_eq!(config.topology_hosts.len(), 2);
    }

    #[test]
    fn test_default_name() {
        let probe = Arc::new(ScriptedProbe::default());
        let resolver = ReachabilityResolver::new(ResolverConfig::new(hosts(1)), probe).unwrap();
        assert_eq!(resolver.name(), "reachability");
        assert_eq!(resolver.config().topology_hosts, hosts(1));
    }
}
