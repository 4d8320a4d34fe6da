//! Error types for the gateway.

use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised while setting up or running the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Error from the shared plumbing (Zenoh, decoding, config loading).
    #[error(transparent)]
    Common(#[from] skyrelay_common::Error),

    /// Zenoh subscription or publication error.
    #[error("Zenoh error: {0}")]
    Zenoh(String),

    /// HTTP client construction error.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Batch encoding error.
    #[error("Failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<zenoh::Error> for GatewayError {
    fn from(err: zenoh::Error) -> Self {
        Self::Zenoh(err.to_string())
    }
}
