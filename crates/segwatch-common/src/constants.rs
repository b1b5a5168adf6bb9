//! Shared constants for Segwatch components.

/// Network interface used for probes when none is configured
pub const DEFAULT_NETWORK_INTERFACE: &str = "eth0";

/// Per-probe timeout in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 200;

/// Hop limit for probes (0 defers to the OS default)
pub const DEFAULT_TTL: u32 = 0;

/// TCP echo port, the target of a reachability probe
pub const DEFAULT_PROBE_PORT: u16 = 7;

/// Default Segwatch HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8899";

/// Interval between background segmentation checks (seconds)
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 10;

/// Linux sysfs root for network interfaces
pub const SYSFS_NET_PATH: &str = "/sys/class/net";

/// IFF_UP bit of the interface flags word
pub const IFF_UP: u32 = 0x1;

/// Process exit codes
pub mod exit_codes {
    /// Segment valid
    pub const VALID: i32 = 0;

    /// Segmentation detected
    pub const SEGMENTED: i32 = 2;
}
