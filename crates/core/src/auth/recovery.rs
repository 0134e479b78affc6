//! Pre-flight and 401-recovery decisions
//!
//! Pure functions so the request pipeline's policy can be tested without a
//! network.

use super::codec::is_near_expiry_at;

/// What the pipeline must do before a request departs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightAction {
    /// Send as-is (with the stored access credential, if any).
    Proceed,
    /// No access credential but a refresh credential exists.
    RenewMissing,
    /// The access credential expires within the skew window.
    RenewNearExpiry,
}

impl PreflightAction {
    pub fn needs_renewal(&self) -> bool {
        !matches!(self, Self::Proceed)
    }
}

/// Decide the pre-flight step from the currently stored credentials.
///
/// Without a refresh credential nothing can be renewed, so the request
/// proceeds regardless of the access credential's state.
pub fn plan_preflight(
    access_token: Option<&str>,
    refresh_token: Option<&str>,
    skew_ms: u64,
    now_ms: i64,
) -> PreflightAction {
    let has_refresh = refresh_token.is_some_and(|token| !token.is_empty());
    match access_token.filter(|token| !token.is_empty()) {
        None if has_refresh => PreflightAction::RenewMissing,
        Some(token) if has_refresh && is_near_expiry_at(Some(token), skew_ms, now_ms) => {
            PreflightAction::RenewNearExpiry
        }
        _ => PreflightAction::Proceed,
    }
}

/// Whether a response is eligible for renew-and-retry. A request that was
/// already resubmitted once never is again.
pub fn should_recover(status: u16, is_auth_endpoint: bool, already_retried: bool) -> bool {
    status == 401 && !is_auth_endpoint && !already_retried
}
