//! Credential pair and derived access claims

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access and refresh credential, always stored and replaced together.
///
/// Wire shape is `{ "accessToken": ..., "refreshToken": ... }`, matching the
/// renewal endpoint response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }

    /// `Authorization` header value for this pair's access credential.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Token values stay out of logs and panic messages.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token_len", &self.access_token.len())
            .field("refresh_token_len", &self.refresh_token.len())
            .finish()
    }
}

/// Claims decoded from an access credential's payload segment.
///
/// Untrusted and best-effort: a value of `0` means the credential could not
/// be decoded and is treated as already expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub expires_at_epoch_ms: i64,
}

impl AccessClaims {
    /// Whether the credential expires at or before `now_ms + skew_ms`.
    pub fn is_near_expiry_at(&self, now_ms: i64, skew_ms: u64) -> bool {
        if self.expires_at_epoch_ms == 0 {
            return true;
        }
        let skew = i64::try_from(skew_ms).unwrap_or(i64::MAX);
        now_ms.saturating_add(skew) >= self.expires_at_epoch_ms
    }
}
