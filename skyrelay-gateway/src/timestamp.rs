//! ISO-8601 timestamps for batch and unit records.

use chrono::{DateTime, Timelike, Utc};
use serde_json::Value;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Format an instant the way the collector expects.
///
/// Seconds precision when the microsecond part is zero, six fractional
/// digits otherwise, always with a `Z` suffix.
pub fn format_iso(instant: DateTime<Utc>) -> String {
    if instant.nanosecond() / 1_000 == 0 {
        instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        instant.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }
}

/// Current wall-clock time, formatted.
pub fn now_iso() -> String {
    format_iso(Utc::now())
}

/// Convert seconds and nanoseconds since the Unix epoch.
///
/// Nanoseconds beyond one second carry into the seconds field. Returns
/// `None` when the instant is out of chrono's range.
pub fn from_sec_nanos(sec: i64, nanos: i64) -> Option<String> {
    let sec = sec.checked_add(nanos.div_euclid(NANOS_PER_SEC))?;
    let nanos = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    // Microsecond resolution on the wire.
    let nanos = nanos - nanos % 1_000;
    DateTime::from_timestamp(sec, nanos).map(format_iso)
}

/// Read a stamp object (`{sec, nanosec}` for ROS 2 or `{sec, nsec}` for ROS 1).
pub fn from_stamp(stamp: &Value) -> Option<String> {
    let object = stamp.as_object()?;
    let sec = object.get("sec").and_then(as_integer)?;
    let nanos = object
        .get("nanosec")
        .or_else(|| object.get("nsec"))
        .and_then(as_integer)?;
    from_sec_nanos(sec, nanos)
}

/// Integral JSON number, accepting floats without a fractional part.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().and_then(|v| i64::try_from(v).ok()))
        .or_else(|| {
            value
                .as_f64()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                .filter(|v| *v >= i64::MIN as f64 && *v < i64::MAX as f64)
                .map(|v| v as i64)
        })
}
