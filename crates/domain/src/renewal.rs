//! Credential renewal failure classification

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cause of a failed renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalErrorKind {
    /// No refresh credential is stored locally; the network was not called.
    NoRefreshToken,
    /// The server answered 2xx without both tokens.
    BadServerResponse,
    /// The server rejected the refresh credential (HTTP 401).
    Unauthorized,
    /// Timeout, connectivity, 5xx or any other failure.
    NetworkOrOther,
}

impl RenewalErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRefreshToken => "NO_REFRESH_TOKEN",
            Self::BadServerResponse => "BAD_REFRESH_RESPONSE",
            Self::Unauthorized => "REFRESH_401",
            Self::NetworkOrOther => "REFRESH_FAILED",
        }
    }

    /// Whether the current session cannot recover without a new login.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NoRefreshToken | Self::Unauthorized)
    }
}

impl fmt::Display for RenewalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified renewal failure.
///
/// `Clone` so a single outcome can be handed to every caller that joined the
/// same renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalError {
    pub kind: RenewalErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_message: Option<String>,
}

impl RenewalError {
    pub fn new(kind: RenewalErrorKind) -> Self {
        Self { kind, http_status: None, server_message: None }
    }

    pub fn no_refresh_token() -> Self {
        Self::new(RenewalErrorKind::NoRefreshToken)
    }

    pub fn bad_server_response(http_status: u16) -> Self {
        Self { http_status: Some(http_status), ..Self::new(RenewalErrorKind::BadServerResponse) }
    }

    /// Classify a failed HTTP exchange: 401 is a rejected refresh credential,
    /// everything else is `NetworkOrOther`.
    pub fn from_status(http_status: u16, server_message: Option<String>) -> Self {
        let kind = if http_status == 401 {
            RenewalErrorKind::Unauthorized
        } else {
            RenewalErrorKind::NetworkOrOther
        };
        Self { kind, http_status: Some(http_status), server_message }
    }

    /// A failure with no HTTP response at all (timeout, connection refused).
    pub fn transport(message: impl Into<String>) -> Self {
        Self { server_message: Some(message.into()), ..Self::new(RenewalErrorKind::NetworkOrOther) }
    }

    /// Human-readable explanation for UI banners and logs.
    pub fn explain(&self) -> String {
        match self.kind {
            RenewalErrorKind::NoRefreshToken => "no refresh token in local storage".to_string(),
            RenewalErrorKind::Unauthorized => match &self.server_message {
                Some(msg) => format!(
                    "refresh rejected (401): {msg}; another session may have rotated or revoked the refresh token"
                ),
                None => "refresh rejected (401): refresh token invalid or not found; another session may have rotated or revoked it".to_string(),
            },
            RenewalErrorKind::BadServerResponse => {
                "refresh succeeded but the server did not return both tokens".to_string()
            }
            RenewalErrorKind::NetworkOrOther => {
                let status =
                    self.http_status.map_or_else(|| "?".to_string(), |status| status.to_string());
                let msg = self.server_message.as_deref().unwrap_or("unknown reason");
                format!("refresh failed ({status}): {msg}")
            }
        }
    }
}

impl fmt::Display for RenewalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.explain())
    }
}

impl std::error::Error for RenewalError {}
