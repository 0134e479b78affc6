//! API-specific error types
//!
//! Provides error classification for requests sent through the pipeline.

use std::time::Duration;

use novaio_domain::{NovaError, RenewalError};
use thiserror::Error;

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Rejected credentials (401, 403) or a failed renewal
    Authentication,
    /// Client errors (4xx except auth) and undecodable bodies
    Client,
    /// Server errors (5xx) and local storage failures
    Server,
    /// Transport errors and timeouts
    Network,
    /// Configuration errors
    Config,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Reactive recovery could not renew the credential; replaces the 401.
    #[error("{0}")]
    Renewal(#[from] RenewalError),

    /// A non-2xx response passed through the pipeline.
    #[error("{path} returned status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status { status: u16, path: String, message: Option<String>, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No access token after pre-flight")]
    NoAccessToken,
}

impl ApiError {
    /// Build a pass-through status error, extracting the server's message.
    pub fn status(status: u16, path: impl Into<String>, body: String) -> Self {
        Self::Status { status, path: path.into(), message: extract_server_message(&body), body }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Renewal(_) | Self::NoAccessToken => ApiErrorCategory::Authentication,
            Self::Status { status: 401 | 403, .. } => ApiErrorCategory::Authentication,
            Self::Status { status: 500..=599, .. } | Self::Store(_) => ApiErrorCategory::Server,
            Self::Status { .. } | Self::Decode(_) => ApiErrorCategory::Client,
            Self::Transport(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// HTTP status of a pass-through failure or a failed renewal call.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Renewal(err) => err.http_status,
            _ => None,
        }
    }

    /// Message the server attached to the failure, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            Self::Renewal(err) => err.server_message.as_deref(),
            _ => None,
        }
    }

    pub fn renewal(&self) -> Option<&RenewalError> {
        match self {
            Self::Renewal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NovaError> for ApiError {
    fn from(err: NovaError) -> Self {
        match err {
            NovaError::Network(message) | NovaError::Auth(message) => Self::Transport(message),
            NovaError::Storage(message) => Self::Store(message),
            NovaError::Config(message) => Self::Config(message),
            NovaError::Serialization(message) => Self::Decode(message),
            NovaError::InvalidInput(message) | NovaError::Internal(message) => {
                Self::Transport(message)
            }
        }
    }
}

/// The `message` field of a JSON error body, else its `error` field.
pub(crate) fn extract_server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"].iter().find_map(|field| match value.get(field)? {
        serde_json::Value::String(text) if !text.is_empty() => Some(text.clone()),
        serde_json::Value::Null => None,
        other if !other.is_string() => Some(other.to_string()),
        _ => None,
    })
}
