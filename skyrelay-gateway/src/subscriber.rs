//! Zenoh subscriber feeding the receiver.

use tokio::sync::watch;
use tracing::{info, trace, warn};
use zenoh::Session;
use zenoh::handlers::RingChannel;
use zenoh::sample::SampleKind;

use crate::config::SourceConfig;
use crate::dispatcher::stop_requested;
use crate::error::{GatewayError, Result};
use crate::receiver::Receiver;

/// Subscribes to the source topic and hands every sample to a [`Receiver`].
///
/// Samples are buffered in a ring of `history_depth` entries; when the
/// receiver falls behind the oldest samples are overwritten.
pub struct TelemetrySubscriber {
    session: Session,
    key_expr: String,
    history_depth: usize,
    receiver: Receiver,
}

impl TelemetrySubscriber {
    pub fn new(
        session: Session,
        key_expr: impl Into<String>,
        history_depth: usize,
        receiver: Receiver,
    ) -> Self {
        Self {
            session,
            key_expr: key_expr.into(),
            history_depth: history_depth.max(1),
            receiver,
        }
    }

    /// Build a subscriber for the configured source topic.
    pub fn from_config(session: Session, source: &SourceConfig, receiver: Receiver) -> Result<Self> {
        let key_expr = source.key_expr()?;
        Ok(Self::new(session, key_expr, source.history_depth, receiver))
    }

    pub fn key_expr(&self) -> &str {
        &self.key_expr
    }

    /// Run until the shutdown flag is set.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            key_expr = %self.key_expr,
            schema = %self.receiver.schema(),
            history_depth = self.history_depth,
            "Subscribing to telemetry"
        );

        let subscriber = self
            .session
            .declare_subscriber(self.key_expr.as_str())
            .with(RingChannel::new(self.history_depth))
            .await
            .map_err(|e| GatewayError::Zenoh(format!("Failed to create subscriber: {}", e)))?;

        loop {
            tokio::select! {
                _ = stop_requested(&mut shutdown) => {
                    info!("Shutdown signal received, stopping subscriber");
                    break;
                }

                sample = subscriber.recv_async() => {
                    match sample {
                        Ok(sample) => {
                            if sample.kind() == SampleKind::Delete {
                                trace!(key = %sample.key_expr(), "Ignoring delete sample");
                                continue;
                            }

                            let payload = sample.payload().to_bytes();
                            self.receiver.on_payload(&payload);
                        }
                        Err(e) => {
                            warn!("Subscriber channel closed: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        subscriber
            .undeclare()
            .await
            .map_err(|e| GatewayError::Zenoh(format!("Failed to undeclare subscriber: {}", e)))?;

        info!("Subscriber stopped");
        Ok(())
    }
}
