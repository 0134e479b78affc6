//! Client configuration structures

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCESS_TOKEN_KEY_SUFFIX, DEFAULT_BASE_URL, DEFAULT_EXPIRY_SKEW_MS, DEFAULT_REFRESH_TIMEOUT_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STORAGE_NAMESPACE, DEFAULT_WATCH_INTERVAL_MS, LOGIN_PATH,
    LOGOUT_PATH, REFRESH_PATH, REFRESH_TOKEN_KEY_SUFFIX, USER_KEY_SUFFIX,
};
use crate::errors::{NovaError, Result};

/// What the request pipeline does when a pre-flight renewal fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreflightFailurePolicy {
    /// Log the failure and send the request with whatever credential is
    /// stored (possibly none).
    #[default]
    Proceed,
    /// Fail the request with the renewal error without sending it.
    Abort,
}

impl std::str::FromStr for PreflightFailurePolicy {
    type Err = NovaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proceed" => Ok(Self::Proceed),
            "abort" => Ok(Self::Abort),
            other => Err(NovaError::Config(format!("unknown pre-flight policy: {other}"))),
        }
    }
}

/// Configuration for the authenticated client and its session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every request path is joined onto.
    pub base_url: String,
    /// Timeout applied to every outbound request, including retries.
    pub request_timeout_ms: u64,
    /// Timeout applied to the renewal call.
    pub refresh_timeout_ms: u64,
    /// Renewal safety margin before the access credential's expiry.
    pub expiry_skew_ms: u64,
    /// Durable storage document. `None` keeps credentials in memory only.
    pub storage_path: Option<PathBuf>,
    /// Prefix of every durable storage key.
    pub storage_namespace: String,
    /// How often the durable store is polled for writes from other processes.
    pub watch_interval_ms: u64,
    /// Path fragments identifying authentication endpoints, which are never
    /// recovered after a 401.
    pub auth_paths: Vec<String>,
    pub preflight_failure: PreflightFailurePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT_MS,
            expiry_skew_ms: DEFAULT_EXPIRY_SKEW_MS,
            storage_path: None,
            storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
            watch_interval_ms: DEFAULT_WATCH_INTERVAL_MS,
            auth_paths: vec![LOGIN_PATH.to_string(), REFRESH_PATH.to_string(), LOGOUT_PATH.to_string()],
            preflight_failure: PreflightFailurePolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create a default configuration pointed at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    /// Whether `path` targets one of the authentication endpoints.
    pub fn is_auth_path(&self, path: &str) -> bool {
        self.auth_paths.iter().any(|fragment| path.contains(fragment.as_str()))
    }

    /// Namespaced storage key names for this configuration.
    pub fn storage_keys(&self) -> StorageKeyNames {
        StorageKeyNames::new(&self.storage_namespace)
    }

    /// Check invariants that serde defaults cannot express.
    ///
    /// # Errors
    /// Returns `NovaError::Config` when the base URL is empty or a timeout is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(NovaError::Config("base_url must not be empty".into()));
        }
        if self.request_timeout_ms == 0 || self.refresh_timeout_ms == 0 {
            return Err(NovaError::Config("timeouts must be greater than zero".into()));
        }
        if self.storage_namespace.trim().is_empty() {
            return Err(NovaError::Config("storage_namespace must not be empty".into()));
        }
        Ok(())
    }
}

/// Fully qualified durable storage key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeyNames {
    pub access_token: String,
    pub refresh_token: String,
    pub user: String,
}

impl StorageKeyNames {
    pub fn new(namespace: &str) -> Self {
        Self {
            access_token: format!("{namespace}_{ACCESS_TOKEN_KEY_SUFFIX}"),
            refresh_token: format!("{namespace}_{REFRESH_TOKEN_KEY_SUFFIX}"),
            user: format!("{namespace}_{USER_KEY_SUFFIX}"),
        }
    }
}

impl Default for StorageKeyNames {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_NAMESPACE)
    }
}
