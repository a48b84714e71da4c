use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use ipnet::Ipv4Net;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::DiscoveryConfig;
use crate::device::{
    is_recognized_info, API_INFO_ENDPOINT, DISCOVERY_ENDPOINT, DISCOVERY_SIGNATURE,
};
use crate::error::{FleetError, Result};
use crate::probe::HttpProbe;

/// Outcome of probing one candidate address
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProbeOutcome {
    /// Signature matched and the device API verified
    Confirmed(String),
    /// Host answered but is not a miner (or failed verification)
    NotAMiner,
    /// Host never answered
    Unreachable,
}

/// Scans a subnet for miners with bounded concurrency.
///
/// Every host address in the subnet is probed through a two-stage
/// check: the root page must contain the device signature, then the
/// system info API must answer with a recognized payload. Per-address
/// failures are swallowed; a scan either fails to parse the subnet or
/// completes.
pub struct DiscoveryScanner {
    config: DiscoveryConfig,
    probe: HttpProbe,
    gate: Arc<Semaphore>,
}

impl DiscoveryScanner {
    /// Create a scanner for the given configuration
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let probe = HttpProbe::new(config.timeout)?;
        let gate = Arc::new(Semaphore::new(config.concurrency.max(1)));

        Ok(Self {
            config,
            probe,
            gate,
        })
    }

    /// Scan the configured subnet and return confirmed miner addresses.
    ///
    /// A subnet where nothing answers is a legitimate empty result, not
    /// an error; only an unparseable CIDR string fails the call.
    pub async fn discover(&self) -> Result<HashSet<String>> {
        let network: Ipv4Net = self
            .config
            .subnet
            .parse()
            .map_err(|_| FleetError::InvalidSubnet(self.config.subnet.clone()))?;

        info!(
            subnet = %network,
            concurrency = self.config.concurrency,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Starting discovery scan"
        );
        let started = Instant::now();

        let tasks: Vec<_> = network
            .hosts()
            .map(|ip| self.probe_candidate(self.candidate_addr(ip)))
            .collect();
        let candidates = tasks.len();

        let outcomes = join_all(tasks).await;

        let mut confirmed = HashSet::new();
        let mut unreachable = 0usize;
        for outcome in outcomes {
            match outcome {
                ProbeOutcome::Confirmed(addr) => {
                    confirmed.insert(addr);
                }
                ProbeOutcome::NotAMiner => {}
                ProbeOutcome::Unreachable => unreachable += 1,
            }
        }

        info!(
            candidates,
            confirmed = confirmed.len(),
            unreachable,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Discovery scan complete"
        );

        Ok(confirmed)
    }

    /// Format the authority a candidate is probed at
    fn candidate_addr(&self, ip: Ipv4Addr) -> String {
        if self.config.port == 80 {
            ip.to_string()
        } else {
            format!("{}:{}", ip, self.config.port)
        }
    }

    /// Probe one candidate, admitted through the concurrency gate
    async fn probe_candidate(&self, addr: String) -> ProbeOutcome {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            // Gate only closes if the scanner is dropped mid-scan
            Err(_) => return ProbeOutcome::Unreachable,
        };

        match self.probe.fetch_text(&addr, DISCOVERY_ENDPOINT).await {
            Ok(body) if body.contains(DISCOVERY_SIGNATURE) => {
                debug!(addr = %addr, "Signature match, verifying device API");
                if self.verify_device(&addr).await {
                    ProbeOutcome::Confirmed(addr)
                } else {
                    ProbeOutcome::NotAMiner
                }
            }
            Ok(_) => ProbeOutcome::NotAMiner,
            Err(FleetError::Http(status)) => {
                debug!(addr = %addr, status, "Non-success response during probe");
                ProbeOutcome::NotAMiner
            }
            Err(FleetError::Timeout) => ProbeOutcome::Unreachable,
            Err(err) => {
                debug!(addr = %addr, error = %err, "Probe failed");
                ProbeOutcome::Unreachable
            }
        }
    }

    /// Second-stage check against the device info API.
    ///
    /// Any failure here discards the candidate; a root page that
    /// happens to contain the signature text is not enough on its own.
    async fn verify_device(&self, addr: &str) -> bool {
        match self.probe.fetch_json(addr, API_INFO_ENDPOINT).await {
            Ok(info) if is_recognized_info(&info) => {
                debug!(addr = %addr, "Verified miner");
                true
            }
            Ok(_) => {
                debug!(addr = %addr, "Info payload not recognized");
                false
            }
            Err(err) => {
                debug!(addr = %addr, error = %err, "Verification failed");
                false
            }
        }
    }
}

/// One-shot convenience wrapper around [`DiscoveryScanner`]
pub async fn discover_miners(config: DiscoveryConfig) -> Result<HashSet<String>> {
    DiscoveryScanner::new(config)?.discover().await
}
