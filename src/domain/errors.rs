//! Domain errors for ecommerce tracking.

use thiserror::Error;

use super::models::RequestId;

/// Errors surfaced synchronously by trackers, the registry and the lifecycle adapter.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Session capability is required for tracking (request {request_id})")]
    MissingSessionCapability { request_id: RequestId },

    #[error("Invalid page type: {0}. Must be one of: detail, checkout, list")]
    InvalidPageType(String),

    #[error("Unsupported value for attribute '{key}': {kind} cannot be serialized")]
    UnsupportedSerializationValue { key: String, kind: &'static str },

    #[error("Invalid decimal literal: {0}")]
    InvalidDecimal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization(err.to_string())
    }
}
