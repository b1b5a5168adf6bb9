//! Configuration management for Segwatch.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use segwatch_common::SegmentationPolicy;
use segwatch_common::constants::{DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_LISTEN_ADDR};

use crate::resolver::ResolverConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr", alias = "listenAddr")]
    pub listen_addr: String,

    /// Seconds between background segmentation checks
    #[serde(default = "default_check_interval", alias = "checkIntervalSecs")]
    pub check_interval_secs: u64,

    /// Reaction to a negative verdict
    #[serde(default, alias = "segmentationPolicy")]
    pub segmentation_policy: SegmentationPolicy,

    /// Deadline for one resolver call, unbounded if unset
    #[serde(default, alias = "resolveTimeoutMs")]
    pub resolve_timeout_ms: Option<u64>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout", alias = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,

    /// Segmentation resolvers, evaluated in order
    #[serde(default)]
    pub resolvers: Vec<ResolverConfig>,
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_check_interval() -> u64 { DEFAULT_CHECK_INTERVAL_SECS }
fn default_request_timeout() -> u64 { 30 }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            Self::from_source(config::File::with_name(config_path))?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(interval) = args.interval {
            config.check_interval_secs = interval;
        }
        if let Some(policy) = args.policy {
            config.segmentation_policy = policy;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from any `config` source
    pub fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to load config file")?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.check_interval_secs > 0, "checkIntervalSecs must be greater than zero");
        anyhow::ensure!(self.request_timeout_secs > 0, "requestTimeoutSecs must be greater than zero");
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn resolve_timeout(&self) -> Option<Duration> {
        self.resolve_timeout_ms.map(Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            check_interval_secs: default_check_interval(),
            segmentation_policy: SegmentationPolicy::default(),
            resolve_timeout_ms: None,
            request_timeout_secs: default_request_timeout(),
            resolvers: Vec::new(),
        }
    }
}
