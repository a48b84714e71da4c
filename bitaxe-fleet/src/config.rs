use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default subnet scanned when none is configured
pub const DEFAULT_SUBNET: &str = "192.168.1.0/24";

/// Suggested interval between full discovery re-scans, in seconds.
/// The engine itself does not re-scan; callers that want periodic
/// rediscovery schedule it themselves.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 3600;

/// Configuration for one discovery scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Subnet to scan, in CIDR form (e.g. "192.168.1.0/24")
    #[serde(default = "default_subnet")]
    pub subnet: String,

    /// TCP port the miners' web interface listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of in-flight probes (1-100)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-probe timeout budget
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
            port: default_port(),
            concurrency: default_concurrency(),
            timeout: default_timeout(),
        }
    }
}

impl DiscoveryConfig {
    /// Scan a specific subnet with default port, concurrency and timeout
    pub fn for_subnet(subnet: impl Into<String>) -> Self {
        Self {
            subnet: subnet.into(),
            ..Default::default()
        }
    }
}

/// Configuration governing the telemetry poll loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between poll cycles
    #[serde(default = "default_poll_interval")]
    pub interval: Duration,

    /// Per-miner request timeout
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum number of in-flight telemetry fetches within one cycle
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            timeout: default_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

// Default value functions for serde
fn default_subnet() -> String {
    DEFAULT_SUBNET.to_string()
}
fn default_port() -> u16 {
    80
}
fn default_concurrency() -> usize {
    20
}
fn default_timeout() -> Duration {
    Duration::from_millis(1500)
}
fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}
