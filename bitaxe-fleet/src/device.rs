//! HTTP surface of the miner firmware.
//!
//! The device serves plain HTTP on three fixed paths: the web UI root
//! (used for the discovery signature check), a system info endpoint
//! (used for verification) and a metrics endpoint (polled every cycle).
//! No TLS, no authentication.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Substring expected in a miner's root page during discovery
pub const DISCOVERY_SIGNATURE: &str = "NerdQAxe";

/// Root page used for the first-pass signature check
pub const DISCOVERY_ENDPOINT: &str = "/";

/// Device info endpoint used to verify a signature match
pub const API_INFO_ENDPOINT: &str = "/api/system/info";

/// Telemetry endpoint polled every cycle
pub const API_METRICS_ENDPOINT: &str = "/api/system/metrics";

/// Check that an info payload carries at least one field the firmware
/// is known to report. Generic web servers that happen to contain the
/// signature text fail this check.
pub fn is_recognized_info(value: &Value) -> bool {
    value.get("version").is_some() || value.get("uptime").is_some()
}

/// One telemetry sample from the metrics endpoint.
///
/// Known fields are typed; anything else the firmware reports is kept
/// in `extra` so sinks can project fields this crate does not model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Hash rate in H/s
    #[serde(rename = "hashRate")]
    pub hash_rate: f64,

    /// Power draw in watts
    pub power: f64,

    /// ASIC temperature in degrees Celsius
    pub temp: f64,

    /// Seconds since the device booted
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,

    /// Number of ASIC chips reported
    #[serde(rename = "asicCount")]
    pub asic_count: u32,

    /// Fields the firmware reports that this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Telemetry {
    /// Mining efficiency in J/GH, derived from power and hashrate and
    /// rounded to two decimal places.
    ///
    /// A zero hashrate yields 0.0 rather than a division error, so the
    /// value is always safe to hand to sinks.
    pub fn efficiency(&self) -> f64 {
        if self.hash_rate <= 0.0 {
            return 0.0;
        }
        let hashrate_gh = self.hash_rate / 1_000_000_000.0;
        ((self.power / hashrate_gh) * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efficiency_zero_hashrate() {
        let telemetry = Telemetry {
            power: 50.0,
            hash_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(telemetry.efficiency(), 0.0);
    }

    #[test]
    fn test_efficiency_zero_power() {
        let telemetry = Telemetry {
            power: 0.0,
            hash_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(telemetry.efficiency(), 0.0);
    }

    #[test]
    fn test_efficiency_nominal() {
        let telemetry = Telemetry {
            power: 100.0,
            hash_rate: 10_000_000_000.0,
            ..Default::default()
        };
        assert_eq!(telemetry.efficiency(), 10.0);
    }

    #[test]
    fn test_efficiency_rounding() {
        let telemetry = Telemetry {
            power: 15.0,
            hash_rate: 1_100_000_000.0,
            ..Default::default()
        };
        // 15 / 1.1 = 13.6363... -> 13.64
        assert_eq!(telemetry.efficiency(), 13.64);
    }

    #[test]
    fn test_parse_metrics_payload() {
        let telemetry: Telemetry = serde_json::from_str(
            r#"{
                "hashRate": 1200000000000.0,
                "power": 22.5,
                "temp": 58.0,
                "uptimeSeconds": 86400,
                "asicCount": 1,
                "bestDiff": "4.29M"
            }"#,
        )
        .unwrap();

        assert_eq!(telemetry.power, 22.5);
        assert_eq!(telemetry.uptime_seconds, 86400);
        assert_eq!(telemetry.asic_count, 1);
        // Unmodeled fields survive the round trip
        assert_eq!(telemetry.extra["bestDiff"], "4.29M");
    }

    #[test]
    fn test_parse_sparse_payload() {
        // Firmware variants omit fields; missing values default to zero
        let telemetry: Telemetry = serde_json::from_str(r#"{"power": 12.0}"#).unwrap();
        assert_eq!(telemetry.power, 12.0);
        assert_eq!(telemetry.hash_rate, 0.0);
        assert_eq!(telemetry.efficiency(), 0.0);
    }

    #[test]
    fn test_recognized_info() {
        let info: Value = serde_json::from_str(r#"{"version": "2.1.0"}"#).unwrap();
        assert!(is_recognized_info(&info));

        let info: Value = serde_json::from_str(r#"{"uptime": 120}"#).unwrap();
        assert!(is_recognized_info(&info));

        let info: Value = serde_json::from_str(r#"{"title": "router admin"}"#).unwrap();
        assert!(!is_recognized_info(&info));
    }
}
