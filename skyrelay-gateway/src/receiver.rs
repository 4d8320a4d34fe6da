//! Turns incoming source messages into queued batches.

use serde_json::Value;
use tracing::{error, trace, warn};

use crate::model::TelemetryBatch;
use crate::queue::SharedQueue;
use crate::schema::MessageSchema;
use crate::stats::SharedStatistics;

/// Entry point for source messages.
///
/// Called from the subscriber's delivery context. Never performs I/O and
/// never blocks beyond a short queue lock.
#[derive(Clone)]
pub struct Receiver {
    schema: MessageSchema,
    queue: SharedQueue,
    stats: SharedStatistics,
}

impl Receiver {
    pub fn new(schema: MessageSchema, queue: SharedQueue, stats: SharedStatistics) -> Self {
        Self {
            schema,
            queue,
            stats,
        }
    }

    pub fn schema(&self) -> MessageSchema {
        self.schema
    }

    /// Handle a raw payload (JSON or CBOR).
    ///
    /// Payloads that cannot be decoded are counted, logged and dropped.
    pub fn on_payload(&self, payload: &[u8]) {
        match skyrelay_common::decode_auto::<Value>(payload) {
            Ok(message) => self.on_event(&message),
            Err(e) => {
                self.stats.record_received();
                error!(
                    schema = %self.schema,
                    payload_len = payload.len(),
                    error = %e,
                    "Error processing message"
                );
            }
        }
    }

    /// Handle an already decoded message.
    pub fn on_event(&self, message: &Value) {
        self.stats.record_received();
        let batch = self.schema.convert(message);
        self.enqueue(batch);
    }

    fn enqueue(&self, batch: TelemetryBatch) {
        trace!(
            seq = batch.msg_seq_number,
            units = batch.uavs.len(),
            "Batch queued"
        );

        if let Some(evicted) = self.queue.push(batch) {
            self.stats.record_dropped();
            warn!(
                seq = evicted.msg_seq_number,
                capacity = self.queue.capacity(),
                "Queue full, dropped oldest batch"
            );
        }
    }
}
