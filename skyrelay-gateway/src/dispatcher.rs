//! Background delivery of queued batches to the HTTP collector.
//!
//! The dispatcher is a single task cycling between two states:
//!
//! ```text
//!   WAIT ──(batch)──> SEND ──(delivered | exhausted | abandoned)──> WAIT
//!    └──(timeout)──┘
//! ```
//!
//! A batch is attempted up to `retry_count` times with a fixed pause
//! between failed attempts. Only HTTP 200 counts as delivered; any other
//! status and any transport failure are retried the same way.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::model::TelemetryBatch;
use crate::queue::SharedQueue;
use crate::stats::SharedStatistics;

/// Pause after an unexpected failure inside one loop iteration.
pub const ERROR_PAUSE: Duration = Duration::from_millis(100);

/// How many times a batch is tried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(100),
        }
    }
}

/// Why a single delivery attempt failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Connection refused, timeout, DNS failure and the like.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The collector answered with something other than 200.
    #[error("collector returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Final result of delivering one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the collector on attempt `attempts`.
    Delivered { attempts: u32 },
    /// Every attempt failed; the batch was discarded.
    Exhausted { attempts: u32 },
    /// Shutdown was requested between attempts; the batch was discarded.
    Abandoned { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::Exhausted { attempts }
            | DeliveryOutcome::Abandoned { attempts } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// HTTP client bound to the collector's batch endpoint.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCollector {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one JSON body. Succeeds only on HTTP 200.
    pub async fn post(&self, body: &[u8]) -> std::result::Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// The delivery worker.
pub struct Dispatcher {
    queue: SharedQueue,
    collector: HttpCollector,
    policy: RetryPolicy,
    poll_timeout: Duration,
    stats: SharedStatistics,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        queue: SharedQueue,
        collector: HttpCollector,
        policy: RetryPolicy,
        poll_timeout: Duration,
        stats: SharedStatistics,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            collector,
            policy,
            poll_timeout,
            stats,
            shutdown,
        }
    }

    /// Build a dispatcher from the gateway configuration.
    pub fn from_config(
        config: &GatewayConfig,
        queue: SharedQueue,
        stats: SharedStatistics,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let collector =
            HttpCollector::new(config.backend.endpoint(), config.backend.request_timeout())?;
        let policy = RetryPolicy {
            attempts: config.pipeline.retry_count,
            delay: config.pipeline.retry_delay(),
        };

        Ok(Self::new(
            queue,
            collector,
            policy,
            config.pipeline.batch_timeout(),
            stats,
            shutdown,
        ))
    }

    /// Deliver one batch according to the retry policy.
    ///
    /// Only an encoding failure is returned as an error; delivery failures
    /// are reported through the outcome and the statistics.
    pub async fn deliver(&self, batch: &TelemetryBatch) -> Result<DeliveryOutcome> {
        let body = serde_json::to_vec(batch)?;
        let attempts = self.policy.attempts.max(1);
        let mut shutdown = self.shutdown.clone();

        for attempt in 1..=attempts {
            match self.collector.post(&body).await {
                Ok(()) => {
                    self.stats.record_sent();
                    debug!(
                        attempt,
                        seq = batch.msg_seq_number,
                        units = batch.uavs.len(),
                        "Batch delivered"
                    );
                    return Ok(DeliveryOutcome::Delivered { attempts: attempt });
                }
                Err(DeliveryError::Rejected { status, body }) => {
                    warn!(attempt, status, body = %body, "Backend returned {}", status);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Send attempt {} failed", attempt);
                }
            }

            if attempt < attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.delay) => {}
                    _ = stop_requested(&mut shutdown) => {}
                }

                if *shutdown.borrow() {
                    self.stats.record_send_error();
                    warn!(
                        attempt,
                        seq = batch.msg_seq_number,
                        "Shutdown requested, abandoning batch"
                    );
                    return Ok(DeliveryOutcome::Abandoned { attempts: attempt });
                }
            }
        }

        self.stats.record_send_error();
        error!(
            attempts,
            seq = batch.msg_seq_number,
            "Failed to send batch after {} attempts",
            attempts
        );
        Ok(DeliveryOutcome::Exhausted { attempts })
    }

    /// One WAIT/SEND cycle. `None` means the queue stayed empty.
    pub async fn run_once(&self) -> Result<Option<DeliveryOutcome>> {
        let Some(batch) = self.queue.pop_timeout(self.poll_timeout).await else {
            trace!("Queue idle");
            return Ok(None);
        };

        self.deliver(&batch).await.map(Some)
    }

    /// Run until the shutdown flag is set.
    ///
    /// A delivery in progress is allowed to finish its current attempt.
    pub async fn run(self) {
        info!(
            endpoint = %self.collector.endpoint(),
            attempts = self.policy.attempts,
            retry_delay_ms = self.policy.delay.as_millis() as u64,
            poll_timeout_ms = self.poll_timeout.as_millis() as u64,
            "Dispatcher started"
        );

        while !*self.shutdown.borrow() {
            isolate(self.run_once()).await;
        }

        info!(pending = self.queue.len(), "Dispatcher stopped");
    }

    /// Spawn the worker; the handle is joined by the shutdown sequence.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Run one loop iteration, turning errors and panics into a log line and
/// a short pause. Returns `None` if the iteration did not complete.
pub(crate) async fn isolate<T, F>(iteration: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(iteration).catch_unwind().await {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => error!(error = %e, "Sender loop error"),
        Err(panic) => error!(panic = %panic_message(&*panic), "Sender loop panicked"),
    }

    tokio::time::sleep(ERROR_PAUSE).await;
    None
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Set the shutdown flag. Works whether or not any task still listens.
pub fn request_stop(shutdown: &watch::Sender<bool>) {
    shutdown.send_replace(true);
}

/// Resolves once the flag is set. Never resolves if the sender is gone
/// without having set it.
pub(crate) async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(100));
    }

    #[test]
    fn test_outcome_accessors() {
        assert_eq!(DeliveryOutcome::Delivered { attempts: 2 }.attempts(), 2);
        assert!(DeliveryOutcome::Delivered { attempts: 1 }.is_delivered());
        assert!(!DeliveryOutcome::Exhausted { attempts: 3 }.is_delivered());
        assert!(!DeliveryOutcome::Abandoned { attempts: 1 }.is_delivered());
    }

    #[test]
    fn test_rejected_message_includes_body() {
        let err = DeliveryError::Rejected {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "collector returned HTTP 503: maintenance");
    }

    #[tokio::test]
    async fn test_isolate_passes_value_through() {
        let value = isolate(async { Ok::<_, crate::error::GatewayError>(7) }).await;
        assert_eq!(value, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_isolate_survives_error() {
        let started = tokio::time::Instant::now();
        let value: Option<()> =
            isolate(async { Err(crate::error::GatewayError::validation("boom")) }).await;

        assert!(value.is_none());
        assert!(started.elapsed() >= ERROR_PAUSE);
    }

    async fn exploding_iteration() -> Result<()> {
        panic!("iteration blew up")
    }

    #[tokio::test(start_paused = true)]
    async fn test_isolate_survives_panic() {
        let started = tokio::time::Instant::now();
        let value = isolate(exploding_iteration()).await;

        assert!(value.is_none());
        assert!(started.elapsed() >= ERROR_PAUSE);
    }

    #[test]
    fn test_panic_message() {
        let static_msg: Box<dyn Any + Send> = Box::new("static");
        let owned_msg: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(static_msg.as_ref()), "static");
        assert_eq!(panic_message(owned_msg.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[test]
    fn test_request_stop_without_listeners() {
        let (tx, rx) = watch::channel(false);
        drop(rx);

        request_stop(&tx);
        assert!(*tx.borrow());
        assert!(*tx.subscribe().borrow());
    }

    #[tokio::test]
    async fn test_stop_requested_resolves_when_set() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), stop_requested(&mut rx))
            .await
            .expect("flag already set");
    }

    #[tokio::test]
    async fn test_stop_requested_pending_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);

        let result =
            tokio::time::timeout(Duration::from_millis(50), stop_requested(&mut rx)).await;
        assert!(result.is_err());
    }
}
