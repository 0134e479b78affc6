//! Integration tests for the session layer over the durable store
//!
//! Two `FileCredentialStore` handles on one document stand in for two
//! processes sharing the same credentials.

mod support;

use std::sync::Arc;
use std::time::Duration;

use novaio_core::{CredentialStore, ExternalChangeSource, NotificationBus};
use novaio_domain::{ClientConfig, CredentialPair, StorageChange, StorageKey};
use novaio_infra::{AuthenticatedClient, FileCredentialStore, Session};
use support::{expired_token, valid_token};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_over(
    server: &MockServer,
    store: &FileCredentialStore,
    bus: &Arc<NotificationBus>,
) -> Session {
    let store: Arc<FileCredentialStore> = Arc::new(store.clone());
    let client = AuthenticatedClient::builder()
        .config(ClientConfig::new(server.uri()))
        .store(Arc::clone(&store) as Arc<dyn CredentialStore>)
        .bus(Arc::clone(bus))
        .build()
        .expect("client should build");
    Session::new(Arc::new(client), Arc::clone(bus))
        .with_external_changes(store as Arc<dyn ExternalChangeSource>)
}

#[tokio::test]
async fn login_in_one_process_is_seen_by_the_other() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let document = dir.path().join("session.json");
    let names = ClientConfig::default().storage_keys();

    let ours = FileCredentialStore::open(&document, names.clone()).unwrap();
    let theirs = FileCredentialStore::open(&document, names).unwrap();

    let session = session_over(&server, &ours, &Arc::new(NotificationBus::new()));
    session.init();
    assert!(!session.is_logged());

    theirs.save_credentials(&CredentialPair::new("access-b", "refresh-b")).unwrap();
    let changes = ours.poll_external_changes().unwrap();

    assert_eq!(changes.len(), 2);
    let snapshot = session.snapshot();
    assert!(snapshot.is_logged());
    assert_eq!(snapshot.access_token.as_deref(), Some("access-b"));

    theirs.clear_credentials().unwrap();
    let changes = ours.poll_external_changes().unwrap();
    assert!(changes.iter().all(|change| change.new_value.is_none()));
    assert!(changes.iter().any(|change| change.key == StorageKey::RefreshToken));
    assert!(!session.is_logged());
}

#[tokio::test]
async fn renewal_updates_the_session_and_the_other_process() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let document = dir.path().join("session.json");
    let names = ClientConfig::default().storage_keys();
    let renewed = CredentialPair::new(valid_token(), "refresh-1");

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": renewed.access_token,
            "refreshToken": renewed.refresh_token,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ours = FileCredentialStore::open(&document, names.clone()).unwrap();
    ours.save_credentials(&CredentialPair::new(expired_token(), "refresh-0")).unwrap();
    let theirs = FileCredentialStore::open(&document, names).unwrap();

    let bus = Arc::new(NotificationBus::new());
    let session = session_over(&server, &ours, &bus);
    session.init();
    session.refresh_now().await.unwrap();

    assert_eq!(session.snapshot().access_token.as_deref(), Some(renewed.access_token.as_str()));
    assert_eq!(theirs.credentials().unwrap(), Some(renewed.clone()));

    let cancel = CancellationToken::new();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        theirs.on_external_change(Arc::new(move |change: &StorageChange| {
            seen.lock().push(change.clone());
        }));
    }
    let watcher = theirs.spawn_watcher(Duration::from_millis(20), cancel.clone());

    ours.save_credentials(&CredentialPair::new("access-2", "refresh-2")).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();
    watcher.await.unwrap();

    let seen = seen.lock();
    assert!(seen
        .iter()
        .any(|change| change.key == StorageKey::AccessToken
            && change.new_value.as_deref() == Some("access-2")));
}
