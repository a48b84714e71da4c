//! Bitaxe Fleet Discovery & Telemetry Engine
//!
//! Finds Bitaxe-class ASIC miners on a local subnet and polls their
//! telemetry APIs, publishing device-set changes to observers.
//!
//! # Features
//!
//! - Bounded-concurrency subnet scanning with a two-stage signature +
//!   API verification check
//! - Timer-driven telemetry polling with per-miner failure isolation
//! - Stale-data retention: an unreachable miner keeps its last-known
//!   telemetry, flagged unavailable, until reconfigured away
//! - Active-set change notifications delivered only when membership
//!   actually changes
//! - Async/await based on Tokio
//!
//! # Example
//!
//! ```no_run
//! use bitaxe_fleet::{discover_miners, DiscoveryConfig, PollConfig, TelemetryPoller};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One-shot scan of the local subnet
//!     let miners = discover_miners(DiscoveryConfig::for_subnet("192.168.1.0/24")).await?;
//!
//!     // Adopt the discovered addresses and poll them forever
//!     let poller = TelemetryPoller::new(miners, PollConfig::default())?;
//!     poller.subscribe(|event| {
//!         for addr in &event.added {
//!             println!("miner online: {}", addr);
//!         }
//!         for addr in &event.removed {
//!             println!("miner offline: {}", addr);
//!         }
//!     });
//!
//!     poller.refresh_once().await;
//!     poller.start();
//!
//!     // ... read poller.records() on demand ...
//!
//!     poller.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod poller;
pub mod probe;
pub mod publisher;

// Re-export main types
pub use config::{DiscoveryConfig, PollConfig, DEFAULT_SCAN_INTERVAL_SECS, DEFAULT_SUBNET};
pub use device::{Telemetry, DISCOVERY_SIGNATURE};
pub use discovery::{discover_miners, DiscoveryScanner};
pub use error::{FleetError, Result};
pub use poller::{MinerRecord, PollerState, TelemetryPoller};
pub use probe::HttpProbe;
pub use publisher::{ChangePublisher, FleetEvent, SubscriptionId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default user agent string
pub fn default_user_agent() -> String {
    format!("BitaxeFleet/{}", VERSION)
}
