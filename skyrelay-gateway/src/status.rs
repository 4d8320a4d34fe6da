//! Periodic status reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use zenoh::Session;

use crate::dispatcher::stop_requested;
use crate::error::{GatewayError, Result};
use crate::queue::SharedQueue;
use crate::stats::{SharedStatistics, StatsSnapshot};

/// Name reported in published status documents.
pub const GATEWAY_NAME: &str = "skyrelay-gateway";

/// Status document published on Zenoh.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    /// Gateway name.
    pub gateway: String,
    /// Gateway version.
    pub version: String,
    /// Current status ("running", "offline").
    pub status: String,
    /// Counter values at the time of the report.
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    /// Batches waiting for delivery.
    pub queued: usize,
}

impl GatewayStatus {
    /// Create a status with "running" state.
    pub fn running(counters: StatsSnapshot, queued: usize) -> Self {
        Self::with_state("running", counters, queued)
    }

    /// Create a status with "offline" state.
    pub fn offline(counters: StatsSnapshot, queued: usize) -> Self {
        Self::with_state("offline", counters, queued)
    }

    fn with_state(status: &str, counters: StatsSnapshot, queued: usize) -> Self {
        Self {
            gateway: GATEWAY_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: status.to_string(),
            counters,
            queued,
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "received={}, sent={}, errors={}",
            self.counters.received, self.counters.sent, self.counters.send_errors
        )
    }
}

/// Logs the counters on a fixed period and optionally publishes them.
#[derive(Clone)]
pub struct StatusReporter {
    stats: SharedStatistics,
    queue: SharedQueue,
    interval: Duration,
    publisher: Option<(Session, String)>,
    reports: Arc<AtomicU64>,
    last_report: Arc<Mutex<Option<GatewayStatus>>>,
}

impl StatusReporter {
    pub fn new(stats: SharedStatistics, queue: SharedQueue, interval: Duration) -> Self {
        Self {
            stats,
            queue,
            interval,
            publisher: None,
            reports: Arc::new(AtomicU64::new(0)),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Also publish each report as JSON to `key`.
    pub fn with_publisher(mut self, session: Session, key: impl Into<String>) -> Self {
        self.publisher = Some((session, key.into()));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of periodic reports emitted so far, shared between clones.
    pub fn reports(&self) -> u64 {
        self.reports.load(Ordering::Relaxed)
    }

    /// The most recent periodic report.
    pub fn last_report(&self) -> Option<GatewayStatus> {
        self.last_report.lock().clone()
    }

    /// Log the current counters and return them.
    pub fn report(&self) -> GatewayStatus {
        let status = GatewayStatus::running(self.stats.snapshot(), self.queue.len());

        info!(
            received = status.counters.received,
            sent = status.counters.sent,
            errors = status.counters.send_errors,
            dropped = status.counters.dropped,
            queued = status.queued,
            "Gateway status: {}",
            status.summary()
        );

        self.reports.fetch_add(1, Ordering::Relaxed);
        *self.last_report.lock() = Some(status.clone());
        status
    }

    /// Publish "running" status with the current counters.
    pub async fn publish_running(&self) {
        let status = GatewayStatus::running(self.stats.snapshot(), self.queue.len());
        self.publish(&status).await;
    }

    /// Publish "offline" status with the final counters.
    pub async fn publish_offline(&self) {
        let status = GatewayStatus::offline(self.stats.snapshot(), self.queue.len());
        self.publish(&status).await;
    }

    async fn publish(&self, status: &GatewayStatus) {
        let Some((session, key)) = &self.publisher else {
            return;
        };

        if let Err(e) = put_json(session, key, status).await {
            warn!(key = %key, error = %e, "Failed to publish gateway status");
        } else {
            debug!(key = %key, status = %status.status, "Published gateway status");
        }
    }

    /// Report every interval until the shutdown flag is set.
    ///
    /// The first report comes one full interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        self.publish_running().await;

        loop {
            tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                _ = ticker.tick() => {
                    let status = self.report();
                    self.publish(&status).await;
                }
            }
        }

        debug!("Status reporter stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

async fn put_json(session: &Session, key: &str, status: &GatewayStatus) -> Result<()> {
    let payload = serde_json::to_vec(status)?;
    session
        .put(key, payload)
        .await
        .map_err(|e| GatewayError::Zenoh(format!("put on '{}' failed: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::BatchQueue;
    use crate::stats::Statistics;

    #[test]
    fn test_status_running() {
        let status = GatewayStatus::running(StatsSnapshot::default(), 0);
        assert_eq!(status.gateway, GATEWAY_NAME);
        assert_eq!(status.status, "running");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_status_serialization_is_flat() {
        let counters = StatsSnapshot {
            received: 10,
            sent: 8,
            send_errors: 1,
            dropped: 0,
        };
        let status = GatewayStatus::offline(counters, 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "offline");
        assert_eq!(json["received"], 10);
        assert_eq!(json["sent"], 8);
        assert_eq!(json["send_errors"], 1);
        assert_eq!(json["queued"], 1);
    }

    #[test]
    fn test_summary() {
        let counters = StatsSnapshot {
            received: 3,
            sent: 2,
            send_errors: 1,
            dropped: 4,
        };
        assert_eq!(
            GatewayStatus::running(counters, 0).summary(),
            "received=3, sent=2, errors=1"
        );
    }

    #[test]
    fn test_report_reads_live_counters() {
        let stats = Arc::new(Statistics::new());
        let queue = Arc::new(BatchQueue::new(8));
        let reporter = StatusReporter::new(stats.clone(), queue, Duration::from_secs(10));

        stats.record_received();
        stats.record_sent();

        let status = reporter.report();
        assert_eq!(status.counters.received, 1);
        assert_eq!(status.counters.sent, 1);
        assert_eq!(status.queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_on_period() {
        let stats = Arc::new(Statistics::new());
        let queue = Arc::new(BatchQueue::new(8));
        let reporter = StatusReporter::new(stats, queue, Duration::from_secs(10));
        let observer = reporter.clone();

        let (tx, rx) = watch::channel(false);
        let handle = reporter.spawn(rx);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(observer.reports(), 0);
        assert!(observer.last_report().is_none());

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(observer.reports(), 1);

        // Nothing flowed through the pipeline, so the snapshot is all zeros.
        let status = observer.last_report().unwrap();
        assert_eq!(status.counters, StatsSnapshot::default());
        assert_eq!(status.queued, 0);
        assert_eq!(status.summary(), "received=0, sent=0, errors=0");

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(observer.reports(), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let stats = Arc::new(Statistics::new());
        let queue = Arc::new(BatchQueue::new(8));
        let reporter = StatusReporter::new(stats, queue, Duration::from_millis(20));

        let (tx, rx) = watch::channel(false);
        let handle = reporter.spawn(rx);

        tokio::time::sleep(Duration::from_millis(70)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter did not stop")
            .unwrap();
    }
}
