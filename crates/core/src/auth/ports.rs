//! Port interfaces for credential storage and renewal
//!
//! These traits define the boundaries between the coordination logic and
//! the infrastructure adapters (durable storage, the renewal endpoint).

use std::sync::Arc;

use async_trait::async_trait;
use novaio_domain::{CredentialPair, RenewalError, Result, StorageChange, UserProfile};

/// Durable key-value storage of the credential pair and cached profile.
///
/// Implementations are the sole owner of the stored pair. Readers must call
/// these methods immediately before use instead of caching the values, since
/// another execution context may rotate them at any time.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Result<Option<String>>;

    fn refresh_token(&self) -> Result<Option<String>>;

    /// The full pair, or `None` unless both entries are present.
    fn credentials(&self) -> Result<Option<CredentialPair>> {
        Ok(match (self.access_token()?, self.refresh_token()?) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        })
    }

    /// Overwrite both entries at once; no reader may observe only one of
    /// them updated.
    fn save_credentials(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove both entries.
    fn clear_credentials(&self) -> Result<()>;

    fn user_profile(&self) -> Result<Option<UserProfile>>;

    /// Store the profile, or remove it when `None`.
    fn save_user_profile(&self, profile: Option<&UserProfile>) -> Result<()>;
}

/// Callback invoked with each storage write made by another execution
/// context.
pub type ExternalChangeListener = Arc<dyn Fn(&StorageChange) + Send + Sync>;

/// Handle returned by [`ExternalChangeSource::on_external_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Source of cross-context storage change notifications.
pub trait ExternalChangeSource: Send + Sync {
    /// Register `listener` for changes made outside this context. Writes made
    /// through this context's own handle are not reported.
    fn on_external_change(&self, listener: ExternalChangeListener) -> ListenerId;

    /// Remove a listener. Returns `false` if it was not registered.
    fn remove_external_listener(&self, id: ListenerId) -> bool;
}

/// Exchanges the stored refresh credential for a new pair.
///
/// On success the implementation has already persisted the pair and
/// published the rotation before returning.
#[async_trait]
pub trait CredentialRenewer: Send + Sync {
    /// # Errors
    /// Returns a classified [`RenewalError`]; `NoRefreshToken` without any
    /// network call when no refresh credential is stored.
    async fn renew(&self) -> std::result::Result<CredentialPair, RenewalError>;
}
