//! Error types for the nightfall client.
//!
//! Every public operation returns either a fully populated result or a
//! single [`NightfallError`]. The client never panics on remote input.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::transport::TransportError;

/// The main error type for client operations.
#[derive(Debug, Error)]
pub enum NightfallError {
    /// The client configuration is invalid. Raised before any network call.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The API answered with a non-success status.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The caller cancelled the operation, or a sibling chunk upload failed.
    #[error("operation was cancelled")]
    Cancelled,

    /// The caller-supplied deadline for the whole operation elapsed.
    #[error("operation timed out after {elapsed:?}")]
    Timeout {
        /// The deadline that elapsed.
        elapsed: Duration,
    },

    /// The API answered with success but the body was unusable.
    #[error("unexpected response: {details}")]
    UnexpectedResponse {
        /// What was wrong with the response.
        details: String,
    },

    /// A request body could not be encoded, or a response body decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading from the content source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred, such as a panicked upload task.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl NightfallError {
    /// Returns `true` if the operation stopped because of a cancellation
    /// or a deadline rather than a remote or network failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout { .. })
    }

    /// Returns `true` if this is a rate-limit error that survived every retry.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api(e) if e.status == 429)
    }

    /// Returns the HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(e) => Some(e.status),
            _ => None,
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an `UnexpectedResponse` error.
    pub fn unexpected_response(details: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            details: details.into(),
        }
    }
}

/// Structured error returned by the API for non-2xx responses.
///
/// When the body is absent or not valid JSON only [`status`](Self::status)
/// and [`code`](Self::code) are populated, both from the HTTP status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// HTTP status of the response.
    #[serde(skip)]
    pub status: u16,

    /// API-specific error code.
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,

    /// Short error message.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,

    /// Longer description of the failure.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Additional key/value context provided by the API.
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_data: HashMap<String, serde_json::Value>,
}

/// Decodes `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ApiError {
    /// Builds an error from a response status and body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let fallback = Self {
            status,
            code: i64::from(status),
            ..Self::default()
        };

        if body.is_empty() {
            return fallback;
        }

        match serde_json::from_slice::<ApiError>(body) {
            Ok(mut parsed) => {
                parsed.status = status;
                parsed
            }
            Err(_) => fallback,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "request failed with status {}", self.status)
        } else {
            write!(f, "{} (status {})", self.message, self.status)
        }
    }
}

impl std::error::Error for ApiError {}

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, NightfallError>;
