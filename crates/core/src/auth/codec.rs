//! Access credential decoding
//!
//! The access credential is a three-part dot-separated token whose middle
//! segment is base64-encoded JSON. Only the `exp` claim (seconds since epoch)
//! is read, and the signature is never checked: the result only decides
//! when to renew, never whether to trust the credential.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use novaio_domain::AccessClaims;

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Decode the expiry instant of `access_token` in epoch milliseconds.
///
/// Never fails: a malformed structure, invalid base64, invalid JSON or a
/// missing/non-numeric `exp` claim all yield `0`.
pub fn decode_expiry(access_token: &str) -> i64 {
    decode_claims(access_token).map_or(0, |claims| claims.expires_at_epoch_ms)
}

fn decode_claims(access_token: &str) -> Option<AccessClaims> {
    let mut segments = access_token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return None;
    };

    let bytes = decode_segment(payload)?;
    let json: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = json.get("exp")?.as_f64().filter(|exp| exp.is_finite())?;

    // `as` saturates for out-of-range floats.
    Some(AccessClaims { expires_at_epoch_ms: (exp * 1000.0) as i64 })
}

// Accepts both the URL-safe alphabet used by JWTs and the standard one, with
// or without padding.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    if trimmed.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(trimmed).or_else(|_| STANDARD_NO_PAD.decode(trimmed)).ok()
}

/// Whether `access_token` is missing or expires within `skew_ms` from now.
pub fn is_near_expiry(access_token: Option<&str>, skew_ms: u64) -> bool {
    is_near_expiry_at(access_token, skew_ms, now_epoch_ms())
}

/// [`is_near_expiry`] against an explicit clock reading.
pub fn is_near_expiry_at(access_token: Option<&str>, skew_ms: u64, now_ms: i64) -> bool {
    match access_token {
        Some(token) if !token.is_empty() => {
            AccessClaims { expires_at_epoch_ms: decode_expiry(token) }
                .is_near_expiry_at(now_ms, skew_ms)
        }
        _ => true,
    }
}
