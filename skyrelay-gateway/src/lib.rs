//! Zenoh to HTTP telemetry gateway for UAV fleets.
//!
//! Subscribes to fleet GPS telemetry on Zenoh, converts each message into a
//! collector batch and POSTs it to the backend's batch endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────┐     ┌─────────┐     ┌────────────┐     ┌───────────┐
//! │  Zenoh Network  │────>│ Receiver │────>│  Queue  │────>│ Dispatcher │────>│ Collector │
//! │ (/all_uavs_gps) │     │ (convert)│     │ (1000)  │     │  (retry)   │     │ HTTP POST │
//! └─────────────────┘     └──────────┘     └─────────┘     └────────────┘     └───────────┘
//! ```
//!
//! The receiver runs in the subscriber's delivery context and never blocks
//! on the network. The dispatcher is the only task doing I/O towards the
//! collector, so at most one request is in flight.
//!
//! # Usage
//!
//! ```bash
//! skyrelay-gateway --config gateway.json5
//! ```
//!
//! See [`config::GatewayConfig`] for configuration options.

pub mod config;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod queue;
pub mod receiver;
pub mod schema;
pub mod stats;
pub mod status;
pub mod subscriber;
pub mod timestamp;

pub use config::GatewayConfig;
pub use dispatcher::{DeliveryError, DeliveryOutcome, Dispatcher, HttpCollector, RetryPolicy};
pub use error::{GatewayError, Result};
pub use model::{TelemetryBatch, UnitRecord};
pub use queue::{BatchQueue, SharedQueue};
pub use receiver::Receiver;
pub use schema::MessageSchema;
pub use stats::{SharedStatistics, Statistics, StatsSnapshot};
pub use status::{GatewayStatus, StatusReporter};
pub use subscriber::TelemetrySubscriber;
