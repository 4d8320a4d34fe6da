//! Configuration for the gateway.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use skyrelay_common::config::{LoggingConfig, ZenohConfig};
use skyrelay_common::keyexpr::topic_to_key_expr;

use crate::error::{GatewayError, Result};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::schema::MessageSchema;

/// Collector path appended to the backend base URL.
pub const BATCH_PATH: &str = "/api/v1/telemetry/batch";

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Subscribed topic and its message schema.
    #[serde(default)]
    pub source: SourceConfig,

    /// Remote collector.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Queueing and delivery policy.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Periodic status reporting.
    #[serde(default)]
    pub status: StatusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source topic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Topic name; ROS-style leading slashes are accepted.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Schema identifier of messages on the topic.
    #[serde(default)]
    pub message_type: MessageSchema,

    /// Samples kept by the subscriber before older ones are overwritten.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

fn default_topic() -> String {
    "/all_uavs_gps".to_string()
}

fn default_history_depth() -> usize {
    10
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            message_type: MessageSchema::default(),
            history_depth: default_history_depth(),
        }
    }
}

impl SourceConfig {
    /// Zenoh key expression for the topic.
    pub fn key_expr(&self) -> Result<String> {
        topic_to_key_expr(&self.topic).map_err(GatewayError::from)
    }
}

/// Collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the collector, e.g. "http://localhost:8080".
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Timeout of a single POST in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BackendConfig {
    /// Full batch endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), BATCH_PATH)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Queue and delivery policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Batches per POST. Accepted for compatibility; every POST carries
    /// exactly one batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How long the dispatcher waits on an empty queue per cycle.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Delivery attempts per batch.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Pause between failed attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Batches held before the oldest is dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_batch_size() -> usize {
    1
}

fn default_batch_timeout_ms() -> u64 {
    100
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl PipelineConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Status reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Report period in seconds.
    #[serde(default = "default_status_interval")]
    pub interval_secs: u64,

    /// Zenoh key to publish status snapshots on (disabled when unset).
    #[serde(default)]
    pub publish_key: Option<String>,
}

fn default_status_interval() -> u64 {
    10
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_status_interval(),
            publish_key: None,
        }
    }
}

impl StatusConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl GatewayConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GatewayError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let config: GatewayConfig = skyrelay_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: GatewayConfig = skyrelay_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.zenoh.validate()?;

        if self.backend.url.trim().is_empty() {
            return Err(GatewayError::validation("backend url cannot be empty"));
        }

        let url = Url::parse(&self.backend.url).map_err(|e| {
            GatewayError::validation(format!("invalid backend url '{}': {}", self.backend.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::validation(format!(
                "backend url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.backend.request_timeout_ms == 0 {
            return Err(GatewayError::validation("request_timeout_ms must be > 0"));
        }

        self.source
            .key_expr()
            .map_err(|e| GatewayError::validation(e.to_string()))?;

        if self.source.history_depth == 0 {
            return Err(GatewayError::validation("history_depth must be > 0"));
        }

        if self.pipeline.batch_size == 0 {
            return Err(GatewayError::validation("batch_size must be > 0"));
        }

        if self.pipeline.batch_timeout_ms == 0 {
            return Err(GatewayError::validation("batch_timeout_ms must be > 0"));
        }

        if self.pipeline.retry_count == 0 {
            return Err(GatewayError::validation("retry_count must be > 0"));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(GatewayError::validation("queue_capacity must be > 0"));
        }

        if self.status.interval_secs == 0 {
            return Err(GatewayError::validation("status interval_secs must be > 0"));
        }

        if let Some(key) = &self.status.publish_key
            && key.trim().is_empty()
        {
            return Err(GatewayError::validation("status publish_key cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = GatewayConfig::parse("{}").unwrap();

        assert_eq!(config.source.topic, "/all_uavs_gps");
        assert_eq!(config.source.message_type, MessageSchema::UavGpsArray);
        assert_eq!(config.source.history_depth, 10);
        assert_eq!(config.backend.url, "http://localhost:8080");
        assert_eq!(config.backend.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.pipeline.batch_size, 1);
        assert_eq!(config.pipeline.batch_timeout(), Duration::from_millis(100));
        assert_eq!(config.pipeline.retry_count, 3);
        assert_eq!(config.pipeline.retry_delay(), Duration::from_millis(100));
        assert_eq!(config.pipeline.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.status.interval(), Duration::from_secs(10));
        assert!(config.status.publish_key.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            zenoh: {
                mode: "client",
                connect: ["tcp/localhost:7447"]
            },
            source: {
                topic: "/uav_gps_array",
                message_type: "uav_msgs/msg/UavGps",
                history_depth: 32
            },
            backend: {
                url: "https://collector.example.com/",
                request_timeout_ms: 2500
            },
            pipeline: {
                batch_size: 4,
                batch_timeout_ms: 250,
                retry_count: 5,
                retry_delay_ms: 50,
                queue_capacity: 64
            },
            status: {
                interval_secs: 30,
                publish_key: "skyrelay/gateway/status"
            },
            logging: {
                level: "debug",
                format: "json"
            }
        }"#;

        let config = GatewayConfig::parse(json).unwrap();

        assert_eq!(config.zenoh.mode, "client");
        assert_eq!(config.source.key_expr().unwrap(), "uav_gps_array");
        assert_eq!(config.source.message_type, MessageSchema::UavGps);
        assert_eq!(config.source.history_depth, 32);
        assert_eq!(
            config.backend.endpoint(),
            "https://collector.example.com/api/v1/telemetry/batch"
        );
        assert_eq!(config.pipeline.batch_size, 4);
        assert_eq!(config.pipeline.retry_count, 5);
        assert_eq!(config.pipeline.queue_capacity, 64);
        assert_eq!(
            config.status.publish_key.as_deref(),
            Some("skyrelay/gateway/status")
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_endpoint_joins_path() {
        let backend = BackendConfig::default();
        assert_eq!(
            backend.endpoint(),
            "http://localhost:8080/api/v1/telemetry/batch"
        );
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let result = GatewayConfig::parse(r#"{ source: { message_type: "std_msgs/msg/String" } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_backend_url() {
        for url in ["", "not a url", "ftp://collector:21"] {
            let json = format!(r#"{{ backend: {{ url: "{}" }} }}"#, url);
            let result = GatewayConfig::parse(&json);
            assert!(
                matches!(result, Err(GatewayError::ConfigValidation(_))),
                "url {:?} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_validate_zero_values() {
        for json in [
            "{ pipeline: { retry_count: 0 } }",
            "{ pipeline: { batch_timeout_ms: 0 } }",
            "{ pipeline: { queue_capacity: 0 } }",
            "{ pipeline: { batch_size: 0 } }",
            "{ backend: { request_timeout_ms: 0 } }",
            "{ source: { history_depth: 0 } }",
            "{ status: { interval_secs: 0 } }",
        ] {
            let result = GatewayConfig::parse(json);
            assert!(
                matches!(result, Err(GatewayError::ConfigValidation(_))),
                "{} should be rejected",
                json
            );
        }
    }

    #[test]
    fn test_validate_topic_and_mode() {
        let result = GatewayConfig::parse(r#"{ source: { topic: "/" } }"#);
        assert!(matches!(result, Err(GatewayError::ConfigValidation(_))));

        let result = GatewayConfig::parse(r#"{ zenoh: { mode: "mesh" } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_not_found() {
        let result = GatewayConfig::load_from_file("/nonexistent/skyrelay.json5");
        assert!(matches!(result, Err(GatewayError::ConfigNotFound { .. })));
    }
}
