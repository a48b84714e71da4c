use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::config::PollConfig;
use crate::device::{Telemetry, API_METRICS_ENDPOINT};
use crate::error::{FleetError, Result};
use crate::probe::HttpProbe;
use crate::publisher::{ChangePublisher, FleetEvent, SubscriptionId};

/// Poller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Stopped,
}

/// Last-known state for one miner in the working set.
///
/// A record is created when the address joins the working set and
/// removed only by reconfiguration. Poll failure flips `available` and
/// records the error but keeps the previous telemetry, so sinks show
/// stale-but-labeled data instead of gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerRecord {
    /// Stable identity key
    pub address: String,
    /// Most recent successfully parsed telemetry; stale while unavailable
    pub telemetry: Option<Telemetry>,
    /// False iff the most recent fetch for this address failed
    pub available: bool,
    /// When telemetry was last fetched successfully
    pub last_success: Option<DateTime<Utc>>,
    /// Why the most recent fetch failed, if it did
    pub last_error: Option<String>,
}

impl MinerRecord {
    fn new(address: String) -> Self {
        Self {
            address,
            telemetry: None,
            available: false,
            last_success: None,
            last_error: None,
        }
    }
}

/// Polls every miner in the working set on a fixed interval.
///
/// Fetches within a cycle run concurrently behind a semaphore gate and
/// fail independently; the cycle completes only once every fetch has
/// resolved, after which the active set is handed to the
/// [`ChangePublisher`].
pub struct TelemetryPoller {
    inner: Arc<PollerInner>,
    state: RwLock<PollerState>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

struct PollerInner {
    config: PollConfig,
    probe: HttpProbe,
    gate: Semaphore,
    records: RwLock<HashMap<String, MinerRecord>>,
    publisher: ChangePublisher,
}

impl TelemetryPoller {
    /// Create a poller for a non-empty working set.
    ///
    /// An empty working set is a setup failure: there is nothing useful
    /// the poller could do.
    pub fn new(addresses: HashSet<String>, config: PollConfig) -> Result<Self> {
        if addresses.is_empty() {
            return Err(FleetError::Setup(
                "working set is empty, nothing to poll".to_string(),
            ));
        }

        let probe = HttpProbe::new(config.timeout)?;
        let records = addresses
            .into_iter()
            .map(|addr| (addr.clone(), MinerRecord::new(addr)))
            .collect();

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(PollerInner {
                gate: Semaphore::new(config.concurrency.max(1)),
                config,
                probe,
                records: RwLock::new(records),
                publisher: ChangePublisher::new(),
            }),
            state: RwLock::new(PollerState::Idle),
            shutdown_tx,
            loop_handle: Mutex::new(None),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> PollerState {
        *self.state.read()
    }

    /// Run one poll cycle synchronously.
    ///
    /// Used on first setup so sinks have data before the timer loop
    /// takes over; also usable out-of-band while the loop runs.
    pub async fn refresh_once(&self) {
        self.inner.run_cycle().await;
    }

    /// Start the timer-driven poll loop.
    ///
    /// The first tick fires one full interval after start; call
    /// [`refresh_once`](Self::refresh_once) beforehand when immediate
    /// data is wanted. Starting an already polling poller is a no-op.
    pub fn start(&self) {
        {
            let mut state = self.state.write();
            if *state == PollerState::Polling {
                return;
            }
            *state = PollerState::Polling;
        }

        info!(
            miners = self.inner.records.read().len(),
            interval_secs = self.inner.config.interval.as_secs(),
            "Starting telemetry poll loop"
        );

        let inner = self.inner.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(inner.config.interval);
            // The immediate first tick would duplicate the caller's
            // initial refresh_once
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        inner.run_cycle().await;
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Poll loop shutting down");
                        break;
                    }
                }
            }
        });

        *self.loop_handle.lock() = Some(handle);
    }

    /// Stop the poll loop.
    ///
    /// Cancels the timer and waits for an in-flight cycle to finish.
    /// Record updates are applied per record, so a cycle interrupted by
    /// shutdown never leaves the table half-written.
    pub async fn stop(&self) {
        *self.state.write() = PollerState::Stopped;
        let _ = self.shutdown_tx.send(true);

        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        info!("Telemetry poller stopped");
    }

    /// Replace the working set.
    ///
    /// New addresses get fresh records; addresses no longer present are
    /// dropped. This is the only path that removes a record.
    pub fn set_addresses(&self, addresses: HashSet<String>) -> Result<()> {
        if addresses.is_empty() {
            return Err(FleetError::Setup(
                "refusing to reconfigure to an empty working set".to_string(),
            ));
        }

        let mut records = self.inner.records.write();
        let before = records.len();
        records.retain(|addr, _| addresses.contains(addr));
        let removed = before - records.len();

        let mut added = 0usize;
        for addr in addresses {
            records.entry(addr.clone()).or_insert_with(|| {
                added += 1;
                MinerRecord::new(addr)
            });
        }

        info!(added, removed, total = records.len(), "Working set updated");
        Ok(())
    }

    /// Snapshot of the full record table
    pub fn records(&self) -> HashMap<String, MinerRecord> {
        self.inner.records.read().clone()
    }

    /// Snapshot of one miner's record
    pub fn record(&self, address: &str) -> Option<MinerRecord> {
        self.inner.records.read().get(address).cloned()
    }

    /// Addresses currently believed reachable
    pub fn active_miners(&self) -> HashSet<String> {
        self.inner.active_set()
    }

    /// Register an observer for active-set membership changes
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&FleetEvent) + Send + Sync + 'static,
    {
        self.inner.publisher.subscribe(observer)
    }

    /// Remove a previously registered observer
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.publisher.unsubscribe(id)
    }
}

impl PollerInner {
    /// One complete pass over the working set
    async fn run_cycle(&self) {
        let addresses: Vec<String> = self.records.read().keys().cloned().collect();

        let fetches: Vec<_> = addresses
            .into_iter()
            .map(|addr| self.poll_miner(addr))
            .collect();
        let results = join_all(fetches).await;

        let mut failed = 0usize;
        for (addr, result) in results {
            match result {
                Ok(telemetry) => self.apply_success(&addr, telemetry),
                Err(err) => {
                    failed += 1;
                    self.apply_failure(&addr, &err);
                }
            }
        }

        let active = self.active_set();
        let snapshot = self.records.read().clone();
        debug!(
            active = active.len(),
            failed,
            "Poll cycle complete"
        );
        self.publisher.publish(active, snapshot);
    }

    /// Fetch and parse one miner's metrics, gated on the semaphore.
    /// Never returns early; the error becomes the record's `last_error`.
    async fn poll_miner(&self, addr: String) -> (String, Result<Telemetry>) {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return (
                    addr,
                    Err(FleetError::Connection("poller shut down".to_string())),
                )
            }
        };

        let result = match self.probe.fetch_json(&addr, API_METRICS_ENDPOINT).await {
            Ok(value) => serde_json::from_value::<Telemetry>(value).map_err(Into::into),
            Err(err) => Err(err),
        };

        (addr, result)
    }

    fn apply_success(&self, addr: &str, telemetry: Telemetry) {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(addr) {
            record.telemetry = Some(telemetry);
            record.available = true;
            record.last_success = Some(Utc::now());
            record.last_error = None;
        }
    }

    fn apply_failure(&self, addr: &str, err: &FleetError) {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(addr) {
            // Stale telemetry is deliberately kept
            record.available = false;
            record.last_error = Some(err.to_string());
        }
    }

    fn active_set(&self) -> HashSet<String> {
        self.records
            .read()
            .values()
            .filter(|record| record.available)
            .map(|record| record.address.clone())
            .collect()
    }
}
