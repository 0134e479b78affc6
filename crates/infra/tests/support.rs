#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use novaio_core::{CredentialStore, NotificationBus};
use novaio_domain::{AuthEvent, AuthEventKind, ClientConfig, CredentialPair, RefreshFailure};
use novaio_infra::{AuthenticatedClient, MemoryCredentialStore};
use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Three-part bearer token whose payload carries `exp` in epoch seconds.
pub fn token_expiring_at(exp_secs: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": "user-1", "exp": exp_secs }).to_string());
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.c2lnbmF0dXJl")
}

/// Token expiring `offset_ms` from now (negative for already expired).
pub fn token_expiring_in(offset_ms: i64) -> String {
    token_expiring_at((Utc::now().timestamp_millis() + offset_ms) / 1000)
}

pub fn valid_token() -> String {
    token_expiring_in(3_600_000)
}

pub fn expired_token() -> String {
    token_expiring_in(-60_000)
}

/// Test fixture: a mock server, a memory store and a client wired to a
/// private bus.
pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemoryCredentialStore>,
    pub bus: Arc<NotificationBus>,
    pub client: Arc<AuthenticatedClient>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|config| config).await
    }

    pub async fn start_with(configure: impl FnOnce(ClientConfig) -> ClientConfig) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryCredentialStore::new());
        let bus = Arc::new(NotificationBus::new());
        let config = configure(ClientConfig::new(server.uri()));
        let client = AuthenticatedClient::builder()
            .config(config)
            .store(Arc::clone(&store) as Arc<dyn CredentialStore>)
            .bus(Arc::clone(&bus))
            .build()
            .expect("client should build");

        Self { server, store, bus, client: Arc::new(client) }
    }

    pub fn seed(&self, access_token: &str, refresh_token: &str) {
        self.store
            .save_credentials(&CredentialPair::new(access_token, refresh_token))
            .expect("seeding the store should succeed");
    }

    /// Mount a refresh endpoint answering `refresh_token` with a new pair.
    pub async fn mount_refresh(
        &self,
        refresh_token: &str,
        renewed: &CredentialPair,
        delay_ms: u64,
        expected_calls: u64,
    ) {
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refreshToken": refresh_token })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "accessToken": renewed.access_token,
                        "refreshToken": renewed.refresh_token,
                    }))
                    .set_delay(std::time::Duration::from_millis(delay_ms)),
            )
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Number of calls the server received for `request_path`.
    pub async fn calls_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }
}

/// Records every event published on a bus.
#[derive(Clone, Default)]
pub struct BusRecorder {
    events: Arc<Mutex<Vec<AuthEvent>>>,
}

impl BusRecorder {
    pub fn attach(bus: &NotificationBus) -> Self {
        let recorder = Self::default();
        for kind in [AuthEventKind::CredentialsRotated, AuthEventKind::RefreshFailed] {
            let events = Arc::clone(&recorder.events);
            bus.subscribe(kind, move |event| events.lock().push(event.clone()));
        }
        recorder
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.events.lock().clone()
    }

    pub fn rotations(&self) -> Vec<CredentialPair> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AuthEvent::CredentialsRotated { access_token, refresh_token } => {
                    Some(CredentialPair::new(access_token, refresh_token))
                }
                AuthEvent::RefreshFailed(_) => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<RefreshFailure> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                AuthEvent::RefreshFailed(failure) => Some(failure),
                AuthEvent::CredentialsRotated { .. } => None,
            })
            .collect()
    }
}
