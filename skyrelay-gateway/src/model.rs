//! Telemetry batch model as posted to the collector.

use serde::{Deserialize, Serialize};

/// One unit of work for the dispatcher: everything derived from a single
/// source message.
///
/// Field names on the wire are lower camel case and every field is always
/// present, defaults included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryBatch {
    /// ISO-8601 UTC timestamp of the source message.
    pub timestamp: String,

    /// Source-provided sequence number (0 when absent).
    pub msg_seq_number: i64,

    /// Reference point latitude.
    pub home_lat: f64,

    /// Reference point longitude.
    pub home_lon: f64,

    /// Reference point altitude.
    pub home_alt: f64,

    /// Number of units known to the source.
    pub num_uavs_total: i64,

    /// Number of units the source considers active.
    pub num_uavs_active: i64,

    /// Units in source order.
    pub uavs: Vec<UnitRecord>,
}

impl TelemetryBatch {
    /// An empty batch stamped with `timestamp`, all other fields defaulted.
    pub fn empty(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            msg_seq_number: 0,
            home_lat: 0.0,
            home_lon: 0.0,
            home_alt: 0.0,
            num_uavs_total: 0,
            num_uavs_active: 0,
            uavs: Vec::new(),
        }
    }
}

/// State snapshot of one tracked vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRecord {
    pub uav_id: i64,
    pub timestamp: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub heading: f64,
    pub ground_speed: f64,
    pub vertical_speed: f64,
    /// Local NED frame, metres.
    pub ned_x: f64,
    pub ned_y: f64,
    pub ned_z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    /// Seconds since this unit last reported.
    pub data_age: f64,
    pub msg_count: i64,
    pub is_active: bool,
}

impl UnitRecord {
    /// A unit with every field defaulted.
    pub fn empty(timestamp: impl Into<String>) -> Self {
        Self {
            uav_id: 0,
            timestamp: timestamp.into(),
            lat: 0.0,
            lon: 0.0,
            alt: 0.0,
            heading: 0.0,
            ground_speed: 0.0,
            vertical_speed: 0.0,
            ned_x: 0.0,
            ned_y: 0.0,
            ned_z: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            data_age: 0.0,
            msg_count: 0,
            is_active: false,
        }
    }
}
