//! Notification bus events and durable storage change records

use serde::{Deserialize, Serialize};

use crate::constants::{EVENT_CREDENTIALS_ROTATED, EVENT_REFRESH_FAILED};
use crate::renewal::{RenewalError, RenewalErrorKind};

/// Event name a bus listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthEventKind {
    #[serde(rename = "credentials-rotated")]
    CredentialsRotated,
    #[serde(rename = "refresh-failed")]
    RefreshFailed,
}

impl AuthEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialsRotated => EVENT_CREDENTIALS_ROTATED,
            Self::RefreshFailed => EVENT_REFRESH_FAILED,
        }
    }
}

/// Payload of a `refresh-failed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFailure {
    pub kind: RenewalErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_message: Option<String>,
    /// Human-readable explanation, see [`RenewalError::explain`].
    pub message: String,
}

impl From<&RenewalError> for RefreshFailure {
    fn from(err: &RenewalError) -> Self {
        Self {
            kind: err.kind,
            http_status: err.http_status,
            server_message: err.server_message.clone(),
            message: err.explain(),
        }
    }
}

/// Events published on the notification bus.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AuthEvent {
    #[serde(rename_all = "camelCase")]
    CredentialsRotated { access_token: String, refresh_token: String },
    RefreshFailed(RefreshFailure),
}

impl AuthEvent {
    pub fn kind(&self) -> AuthEventKind {
        match self {
            Self::CredentialsRotated { .. } => AuthEventKind::CredentialsRotated,
            Self::RefreshFailed(_) => AuthEventKind::RefreshFailed,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl std::fmt::Debug for AuthEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialsRotated { .. } => f.write_str("CredentialsRotated { .. }"),
            Self::RefreshFailed(failure) => f.debug_tuple("RefreshFailed").field(failure).finish(),
        }
    }
}

/// Durable storage entry a change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    User,
}

/// A write to durable storage made by another execution context.
///
/// `new_value` is the raw stored string (the user profile as JSON) or `None`
/// when the entry was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageChange {
    pub key: StorageKey,
    pub new_value: Option<String>,
}

impl StorageChange {
    pub fn new(key: StorageKey, new_value: Option<String>) -> Self {
        Self { key, new_value }
    }
}
