//! Best-effort conversion of decoded source messages into batches.
//!
//! Every field is read independently. A missing or mistyped attribute
//! yields its default; conversion itself never fails.

use serde_json::Value;

use crate::model::{TelemetryBatch, UnitRecord};
use crate::timestamp::{self, as_integer};

/// Convert a fleet message (`UavGpsArray`) into a batch.
pub fn convert_fleet(message: &Value) -> TelemetryBatch {
    let units = message
        .get("uavs")
        .and_then(Value::as_array)
        .map(|uavs| uavs.iter().map(convert_unit).collect())
        .unwrap_or_default();

    TelemetryBatch {
        timestamp: resolve_timestamp(message),
        msg_seq_number: int_field(message, "msg_seq_number"),
        home_lat: float_field(message, "home_lat"),
        home_lon: float_field(message, "home_lon"),
        home_alt: float_field(message, "home_alt"),
        num_uavs_total: int_field(message, "num_uavs_total"),
        num_uavs_active: int_field(message, "num_uavs_active"),
        uavs: units,
    }
}

/// Convert a single-vehicle message (`UavGps`) into a batch of one.
pub fn convert_single(message: &Value) -> TelemetryBatch {
    let unit = convert_unit(message);

    let mut batch = TelemetryBatch::empty(unit.timestamp.clone());
    batch.msg_seq_number = int_field(message, "msg_seq_number");
    batch.num_uavs_total = 1;
    batch.num_uavs_active = i64::from(unit.is_active);
    batch.uavs.push(unit);
    batch
}

/// Convert one vehicle entry.
pub fn convert_unit(uav: &Value) -> UnitRecord {
    UnitRecord {
        uav_id: int_field(uav, "id"),
        timestamp: resolve_timestamp(uav),
        lat: float_field(uav, "lat"),
        lon: float_field(uav, "lon"),
        alt: float_field(uav, "alt"),
        heading: float_field(uav, "heading"),
        ground_speed: float_field(uav, "ground_speed"),
        vertical_speed: float_field(uav, "vertical_speed"),
        ned_x: float_field(uav, "ned_x"),
        ned_y: float_field(uav, "ned_y"),
        ned_z: float_field(uav, "ned_z"),
        vx: float_field(uav, "vx"),
        vy: float_field(uav, "vy"),
        vz: float_field(uav, "vz"),
        data_age: float_field(uav, "data_age"),
        msg_count: int_field(uav, "msg_count"),
        is_active: bool_field(uav, "is_active"),
    }
}

/// Resolve the timestamp of a message or unit.
///
/// Order: the `timestamp` stamp object, then top-level `sec` with
/// `nsec`/`nanosec`, then the wall clock.
pub fn resolve_timestamp(value: &Value) -> String {
    value
        .get("timestamp")
        .and_then(timestamp::from_stamp)
        .or_else(|| timestamp::from_stamp(value))
        .unwrap_or_else(timestamp::now_iso)
}

fn float_field(value: &Value, name: &str) -> f64 {
    value.get(name).and_then(Value::as_f64).unwrap_or(0.0)
}

fn int_field(value: &Value, name: &str) -> i64 {
    value.get(name).and_then(as_integer).unwrap_or(0)
}

fn bool_field(value: &Value, name: &str) -> bool {
    match value.get(name) {
        Some(Value::Bool(flag)) => *flag,
        Some(other) => matches!(as_integer(other), Some(1)),
        None => false,
    }
}
