//! Supported source message schemas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::convert;
use crate::model::TelemetryBatch;

/// Message schema of the subscribed topic, keyed by its ROS type name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageSchema {
    /// Fleet snapshot: home position, counts and a `uavs` array.
    #[default]
    #[serde(rename = "uav_msgs/msg/UavGpsArray")]
    UavGpsArray,

    /// A single vehicle report.
    #[serde(rename = "uav_msgs/msg/UavGps")]
    UavGps,
}

impl MessageSchema {
    /// All supported schemas.
    pub const ALL: [MessageSchema; 2] = [MessageSchema::UavGpsArray, MessageSchema::UavGps];

    /// The schema identifier as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSchema::UavGpsArray => "uav_msgs/msg/UavGpsArray",
            MessageSchema::UavGps => "uav_msgs/msg/UavGps",
        }
    }

    /// Convert a decoded message of this schema into a batch.
    pub fn convert(&self, message: &Value) -> TelemetryBatch {
        match self {
            MessageSchema::UavGpsArray => convert::convert_fleet(message),
            MessageSchema::UavGps => convert::convert_single(message),
        }
    }
}

impl fmt::Display for MessageSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown schema identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported message type '{0}' (supported: uav_msgs/msg/UavGpsArray, uav_msgs/msg/UavGps)")]
pub struct UnknownSchema(pub String);

impl FromStr for MessageSchema {
    type Err = UnknownSchema;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageSchema::ALL
            .into_iter()
            .find(|schema| schema.as_str() == s)
            .ok_or_else(|| UnknownSchema(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_roundtrip() {
        for schema in MessageSchema::ALL {
            assert_eq!(schema.as_str().parse::<MessageSchema>().unwrap(), schema);
            let quoted = serde_json::to_string(&schema).unwrap();
            assert_eq!(quoted, format!("\"{}\"", schema));
        }
    }

    #[test]
    fn test_unknown_identifier() {
        let err = "geometry_msgs/msg/Pose".parse::<MessageSchema>().unwrap_err();
        assert!(err.to_string().contains("geometry_msgs/msg/Pose"));

        let parsed: Result<MessageSchema, _> = serde_json::from_str("\"uav_msgs/msg/Other\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_dispatch_by_schema() {
        let message = json!({ "id": 3, "uavs": [{ "id": 1 }, { "id": 2 }] });

        assert_eq!(MessageSchema::UavGpsArray.convert(&message).uavs.len(), 2);

        let single = MessageSchema::UavGps.convert(&message);
        assert_eq!(single.uavs.len(), 1);
        assert_eq!(single.uavs[0].uav_id, 3);
    }
}
