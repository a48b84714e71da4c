//! Scan a subnet for miners, then watch their telemetry.
//!
//! Discovers miners on the configured subnet, adopts the result as the
//! poll working set and prints set changes plus a periodic summary.

use bitaxe_fleet::{discover_miners, DiscoveryConfig, PollConfig, TelemetryPoller};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("bitaxe_fleet=debug,fleet_watch=info")
        .init();

    // Subnet comes from the command line, default per firmware docs
    let subnet = std::env::args()
        .nth(1)
        .unwrap_or_else(|| bitaxe_fleet::DEFAULT_SUBNET.to_string());

    info!("Scanning {} for miners", subnet);
    let miners = discover_miners(DiscoveryConfig::for_subnet(subnet)).await?;

    if miners.is_empty() {
        // A clean scan with no hits is normal on networks without
        // miners; nothing to watch though
        warn!("No miners found, exiting");
        return Ok(());
    }
    info!("Adopting {} miner(s)", miners.len());

    let poller = TelemetryPoller::new(
        miners,
        PollConfig {
            interval: Duration::from_secs(30),
            ..Default::default()
        },
    )?;

    poller.subscribe(|event| {
        for addr in &event.added {
            println!("miner online:  {}", addr);
        }
        for addr in &event.removed {
            println!("miner offline: {}", addr);
        }
    });

    // Prime the record table before the timer loop takes over
    poller.refresh_once().await;
    poller.start();

    // Print a summary every minute until Ctrl+C
    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(60)) => {
                for (addr, record) in poller.records() {
                    match record.telemetry {
                        Some(t) if record.available => println!(
                            "{}: {:.2} GH/s, {:.1} W, {:.1} C, {:.2} J/GH",
                            addr,
                            t.hash_rate / 1_000_000_000.0,
                            t.power,
                            t.temp,
                            t.efficiency(),
                        ),
                        Some(t) => println!(
                            "{}: unavailable (last known {:.2} GH/s)",
                            addr,
                            t.hash_rate / 1_000_000_000.0,
                        ),
                        None => println!("{}: no data yet", addr),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    info!("Shutting down...");
    poller.stop().await;

    Ok(())
}

// Run with: cargo run --example fleet_watch -- 192.168.1.0/24
