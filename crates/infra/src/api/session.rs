//! Session lifecycle
//!
//! Keeps an in-memory snapshot of the signed-in state for UI collaborators
//! and updates it from three sources: this session's own actions, bus
//! events (rotation, renewal failure) and writes made by other execution
//! contexts. The snapshot is a projection; the credential store stays the
//! source of truth.

use std::fmt;
use std::sync::Arc;

use novaio_core::{ExternalChangeSource, ListenerId, NotificationBus, SubscriptionId};
use novaio_domain::constants::{LOGIN_PATH, LOGOUT_PATH};
use novaio_domain::{
    AuthEvent, AuthEventKind, AuthResponse, ClientConfig, CredentialPair, LoginRequest, Result,
    StorageChange, StorageKey, UserProfile,
};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::AuthenticatedClient;
use super::errors::ApiError;
use super::request::ApiRequest;
use crate::storage::ConfiguredStore;

const LOGIN_FAILED: &str = "Login failed";

/// Point-in-time view of the session.
#[derive(Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Last login or renewal failure, for display.
    pub last_error: Option<String>,
    /// A login is in progress.
    pub loading: bool,
}

impl SessionSnapshot {
    /// Both credentials are present.
    pub fn is_logged(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn apply(&mut self, change: &StorageChange) {
        match change.key {
            StorageKey::AccessToken => self.access_token = change.new_value.clone(),
            StorageKey::RefreshToken => self.refresh_token = change.new_value.clone(),
            StorageKey::User => {
                self.user =
                    change.new_value.as_deref().and_then(|raw| serde_json::from_str(raw).ok());
            }
        }
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("user", &self.user.as_ref().map(|u| &u.id))
            .field("has_access", &self.access_token.is_some())
            .field("has_refresh", &self.refresh_token.is_some())
            .field("last_error", &self.last_error)
            .field("loading", &self.loading)
            .finish()
    }
}

/// Login, logout and forced refresh on top of an [`AuthenticatedClient`].
pub struct Session {
    client: Arc<AuthenticatedClient>,
    bus: Arc<NotificationBus>,
    external: Option<Arc<dyn ExternalChangeSource>>,
    state: Arc<RwLock<SessionSnapshot>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    external_listener: Mutex<Option<ListenerId>>,
    watcher: Option<CancellationToken>,
}

impl Session {
    pub fn new(client: Arc<AuthenticatedClient>, bus: Arc<NotificationBus>) -> Self {
        let session = Self {
            client,
            bus,
            external: None,
            state: Arc::new(RwLock::new(SessionSnapshot::default())),
            subscriptions: Mutex::new(Vec::new()),
            external_listener: Mutex::new(None),
            watcher: None,
        };
        session.reload_tokens();
        session
    }

    /// Open the store selected by `config`, build a client on it and follow
    /// its external changes. A file store is polled every
    /// `watch_interval_ms` until the session is dropped. Call [`Session::init`]
    /// before use.
    ///
    /// # Errors
    /// `ApiError::Config` for an invalid configuration or a file store outside
    /// a Tokio runtime; `ApiError::Store` or `ApiError::Decode` for an
    /// unreadable document.
    pub fn connect(
        config: ClientConfig,
        bus: Arc<NotificationBus>,
    ) -> std::result::Result<Self, ApiError> {
        let configured = ConfiguredStore::open(&config)?;
        let client = AuthenticatedClient::builder()
            .config(config.clone())
            .store(configured.store())
            .bus(Arc::clone(&bus))
            .build()?;

        let cancel = CancellationToken::new();
        configured.spawn_watcher(&config, cancel.clone())?;

        let mut session =
            Self::new(Arc::new(client), bus).with_external_changes(configured.changes());
        session.watcher = Some(cancel);
        Ok(session)
    }

    /// Also follow writes other execution contexts make to the store.
    pub fn with_external_changes(mut self, source: Arc<dyn ExternalChangeSource>) -> Self {
        self.external = Some(source);
        self
    }

    /// Load the stored state and start listening for rotations, renewal
    /// failures and external writes. Listeners are registered once; later
    /// calls only reload.
    pub fn init(&self) {
        debug!("session init");
        let user = self.client.store().user_profile().unwrap_or_else(|err| {
            warn!(error = %err, "failed to read stored user profile");
            None
        });
        self.state.write().user = user;
        self.reload_tokens();

        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }

        let state = Arc::clone(&self.state);
        subscriptions.push(self.bus.subscribe(AuthEventKind::CredentialsRotated, move |event| {
            if let AuthEvent::CredentialsRotated { access_token, refresh_token } = event {
                debug!("credentials rotated; updating session");
                let mut snapshot = state.write();
                snapshot.access_token = Some(access_token.clone());
                snapshot.refresh_token = Some(refresh_token.clone());
            }
        }));

        let state = Arc::clone(&self.state);
        subscriptions.push(self.bus.subscribe(AuthEventKind::RefreshFailed, move |event| {
            if let AuthEvent::RefreshFailed(failure) = event {
                debug!(kind = %failure.kind, "refresh failed; recording error");
                state.write().last_error = Some(failure.message.clone());
            }
        }));

        if let Some(source) = &self.external {
            let state = Arc::clone(&self.state);
            let id = source.on_external_change(Arc::new(move |change: &StorageChange| {
                debug!(key = ?change.key, present = change.new_value.is_some(), "external storage change");
                state.write().apply(change);
            }));
            *self.external_listener.lock() = Some(id);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().clone()
    }

    pub fn is_logged(&self) -> bool {
        self.state.read().is_logged()
    }

    /// Sign in. On failure the error is recorded in the snapshot and
    /// nothing stored is cleared.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        {
            let mut snapshot = self.state.write();
            snapshot.loading = true;
            snapshot.last_error = None;
        }
        info!(email, "login started");

        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        let outcome = match self.client.post::<_, AuthResponse>(LOGIN_PATH, &body).await {
            Ok(response) => self
                .set_user(Some(response.user))
                .and_then(|()| self.set_tokens(&response.tokens.credential_pair()))
                .map_err(|err| err.to_string()),
            Err(err) => Err(login_error_message(&err)),
        };

        let mut snapshot = self.state.write();
        snapshot.loading = false;
        match outcome {
            Ok(()) => {
                info!("login succeeded");
                true
            }
            Err(message) => {
                warn!(error = %message, "login failed");
                snapshot.last_error = Some(message);
                false
            }
        }
    }

    /// Best-effort server logout, then always clear local state.
    ///
    /// # Errors
    /// Only local storage failures are returned.
    pub async fn logout(&self) -> Result<()> {
        info!("logout started");
        match self.client.send(ApiRequest::post(LOGOUT_PATH)).await {
            Ok(response) if response.status().is_success() => debug!("server logout acknowledged"),
            Ok(response) => warn!(status = %response.status(), "server logout rejected (ignored)"),
            Err(err) => warn!(error = %err, "server logout failed (ignored)"),
        }
        self.clear_client_side()?;
        info!("logout finished");
        Ok(())
    }

    /// Force pre-flight now and reload the stored credentials.
    ///
    /// # Errors
    /// See [`AuthenticatedClient::ensure_fresh_access_token`].
    pub async fn refresh_now(&self) -> std::result::Result<(), ApiError> {
        debug!("forced refresh");
        self.client.ensure_fresh_access_token().await?;
        self.reload_tokens();
        Ok(())
    }

    /// Replace both credentials in the snapshot and the store.
    ///
    /// # Errors
    /// Propagates store write failures; the snapshot is updated regardless.
    pub fn set_tokens(&self, pair: &CredentialPair) -> Result<()> {
        debug!(
            access_len = pair.access_token.len(),
            refresh_len = pair.refresh_token.len(),
            "set tokens"
        );
        {
            let mut snapshot = self.state.write();
            snapshot.access_token = Some(pair.access_token.clone());
            snapshot.refresh_token = Some(pair.refresh_token.clone());
        }
        self.client.store().save_credentials(pair)
    }

    /// Replace or remove the cached profile.
    ///
    /// # Errors
    /// Propagates store write failures; the snapshot is updated regardless.
    pub fn set_user(&self, user: Option<UserProfile>) -> Result<()> {
        debug!(has_user = user.is_some(), "set user");
        let result = self.client.store().save_user_profile(user.as_ref());
        self.state.write().user = user;
        result
    }

    /// Remove the credentials and profile locally, without calling the
    /// server.
    ///
    /// # Errors
    /// The first store failure; every entry removal is still attempted.
    pub fn clear_client_side(&self) -> Result<()> {
        debug!("clearing client-side session");
        {
            let mut snapshot = self.state.write();
            snapshot.user = None;
            snapshot.access_token = None;
            snapshot.refresh_token = None;
        }
        let store = self.client.store();
        let credentials = store.clear_credentials();
        let profile = store.save_user_profile(None);
        credentials.and(profile)
    }

    fn reload_tokens(&self) {
        let store = self.client.store();
        let (access, refresh) = match (store.access_token(), store.refresh_token()) {
            (Ok(access), Ok(refresh)) => (access, refresh),
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "failed to read stored credentials");
                return;
            }
        };
        let mut snapshot = self.state.write();
        snapshot.access_token = access;
        snapshot.refresh_token = refresh;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for id in self.subscriptions.get_mut().drain(..) {
            self.bus.unsubscribe(id);
        }
        if let (Some(source), Some(id)) = (&self.external, self.external_listener.get_mut().take()) {
            source.remove_external_listener(id);
        }
        if let Some(watcher) = &self.watcher {
            watcher.cancel();
        }
    }
}

fn login_error_message(err: &ApiError) -> String {
    match err {
        ApiError::Status { message: Some(message), .. } => message.clone(),
        _ => LOGIN_FAILED.to_string(),
    }
}
