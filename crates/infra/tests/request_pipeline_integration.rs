//! Integration tests for the authenticated request pipeline
//!
//! Pre-flight renewal, recovery after a 401, and the single-flight guarantee
//! against a mock API.

mod support;

use futures::future::join_all;
use novaio_core::CredentialStore;
use novaio_domain::{CredentialPair, RenewalErrorKind};
use novaio_infra::{ApiError, ApiRequest};
use serde_json::{json, Value};
use support::{expired_token, token_expiring_in, valid_token, BusRecorder, Harness};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() {
    let harness = Harness::start().await;
    harness.seed(&expired_token(), "refresh-0");
    let renewed = CredentialPair::new(valid_token(), "refresh-1");
    harness.mount_refresh("refresh-0", &renewed, 200, 1).await;

    Mock::given(method("GET"))
        .and(path("/rooms"))
        .and(header("authorization", format!("Bearer {}", renewed.access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rooms": [] })))
        .expect(5)
        .mount(&harness.server)
        .await;

    let requests = (0..5).map(|_| {
        let client = std::sync::Arc::clone(&harness.client);
        async move { client.get::<Value>("/rooms").await }
    });

    for result in join_all(requests).await {
        assert_eq!(result.expect("request should succeed"), json!({ "rooms": [] }));
    }
    assert_eq!(harness.calls_to("/auth/refresh").await, 1);
}

#[tokio::test]
async fn retried_request_is_not_recovered_again() {
    let harness = Harness::start().await;
    harness.seed(&valid_token(), "refresh-0");
    let renewed = CredentialPair::new(valid_token(), "refresh-1");
    harness.mount_refresh("refresh-0", &renewed, 0, 1).await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&harness.server)
        .await;

    let response = harness.client.send(ApiRequest::get("/profile")).await.unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(harness.store.credentials().unwrap(), Some(renewed));
}

#[tokio::test]
async fn auth_endpoint_401_is_returned_untouched() {
    let harness = Harness::start().await;
    harness.seed(&valid_token(), "refresh-0");
    harness.mount_refresh("refresh-0", &CredentialPair::new("a", "r"), 0, 0).await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "bad credentials" })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let request = ApiRequest::post("/auth/login")
        .json(&json!({ "email": "a@b.test", "password": "nope" }))
        .unwrap();
    let response = harness.client.send(request).await.unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(harness.calls_to("/auth/refresh").await, 0);
}

#[tokio::test]
async fn logout_401_is_returned_untouched() {
    let harness = Harness::start().await;
    harness.seed(&valid_token(), "refresh-0");
    harness.mount_refresh("refresh-0", &CredentialPair::new("a", "r"), 0, 0).await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness.client.send(ApiRequest::post("/auth/logout")).await.unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(harness.calls_to("/auth/refresh").await, 0);
}

#[tokio::test]
async fn caller_sent_refresh_401_is_returned_untouched() {
    let harness = Harness::start().await;
    harness.seed(&valid_token(), "refresh-0");

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "revoked" })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let request =
        ApiRequest::post("/auth/refresh").json(&json!({ "refreshToken": "refresh-0" })).unwrap();
    let response = harness.client.send(request).await.unwrap();

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(harness.calls_to("/auth/refresh").await, 1, "only the caller's own call");
    assert_eq!(harness.store.refresh_token().unwrap().as_deref(), Some("refresh-0"));
}

#[tokio::test]
async fn no_credentials_means_no_authorization_header() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let _: Value = harness.client.get("/public").await.unwrap();

    let requests = harness.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "no refresh call without a refresh token");
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn token_inside_skew_window_is_renewed_before_departure() {
    let harness = Harness::start_with(|mut config| {
        config.expiry_skew_ms = 15_000;
        config
    })
    .await;
    let near_expiry = token_expiring_in(10_000);
    harness.seed(&near_expiry, "refresh-0");
    let renewed = CredentialPair::new(valid_token(), "refresh-1");
    harness.mount_refresh("refresh-0", &renewed, 0, 1).await;

    Mock::given(method("GET"))
        .and(path("/rooms"))
        .and(header("authorization", format!("Bearer {near_expiry}").as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rooms"))
        .and(header("authorization", format!("Bearer {}", renewed.access_token).as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&harness.server)
        .await;

    let _: () = harness.client.get("/rooms").await.unwrap();

    let order: Vec<String> = harness
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect();
    assert_eq!(order, vec!["/auth/refresh".to_string(), "/rooms".to_string()]);
}

#[tokio::test]
async fn concurrent_401s_trigger_a_single_refresh() {
    let harness = Harness::start().await;
    let original = valid_token();
    harness.seed(&original, "refresh-0");
    let renewed = CredentialPair::new(valid_token(), "refresh-1");
    harness.mount_refresh("refresh-0", &renewed, 200, 1).await;

    Mock::given(method("GET"))
        .and(header("authorization", format!("Bearer {original}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", format!("Bearer {}", renewed.access_token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&harness.server)
        .await;

    let (first, second) =
        tokio::join!(harness.client.get::<Value>("/rooms/1"), harness.client.get::<Value>("/rooms/2"));

    assert_eq!(first.unwrap(), json!({ "ok": true }));
    assert_eq!(second.unwrap(), json!({ "ok": true }));
    assert_eq!(harness.calls_to("/auth/refresh").await, 1);
}

#[tokio::test]
async fn rejected_refresh_fails_every_waiter_and_keeps_the_store() {
    let harness = Harness::start().await;
    let recorder = BusRecorder::attach(&harness.bus);
    let original = valid_token();
    harness.seed(&original, "refresh-0");

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "refresh token revoked" }))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rooms"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&harness.server)
        .await;

    let requests = (0..3).map(|_| {
        let client = std::sync::Arc::clone(&harness.client);
        async move { client.send(ApiRequest::get("/rooms")).await }
    });

    for result in join_all(requests).await {
        match result {
            Err(ApiError::Renewal(err)) => {
                assert_eq!(err.kind, RenewalErrorKind::Unauthorized);
                assert_eq!(err.http_status, Some(401));
                assert_eq!(err.server_message.as_deref(), Some("refresh token revoked"));
            }
            other => panic!("expected a renewal failure, got {other:?}"),
        }
    }

    assert_eq!(harness.store.credentials().unwrap(), Some(CredentialPair::new(original, "refresh-0")));

    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, RenewalErrorKind::Unauthorized);
    assert_eq!(failures[0].http_status, Some(401));
    assert!(recorder.rotations().is_empty());
}

#[tokio::test]
async fn renewal_persists_and_publishes_the_new_pair() {
    let harness = Harness::start().await;
    let recorder = BusRecorder::attach(&harness.bus);
    harness.seed(&expired_token(), "refresh-0");
    let renewed = CredentialPair::new(valid_token(), "refresh-1");
    harness.mount_refresh("refresh-0", &renewed, 0, 1).await;

    let token = harness.client.ensure_fresh_access_token().await.unwrap();

    assert_eq!(token, renewed.access_token);
    assert_eq!(harness.store.credentials().unwrap(), Some(renewed.clone()));
    assert_eq!(recorder.rotations(), vec![renewed]);
    assert!(recorder.failures().is_empty());
}

#[tokio::test]
async fn preflight_failure_proceeds_with_the_stored_credential() {
    let harness = Harness::start().await;
    let recorder = BusRecorder::attach(&harness.bus);
    let stale = expired_token();
    harness.seed(&stale, "refresh-0");

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rooms"))
        .and(header("authorization", format!("Bearer {stale}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&harness.server)
        .await;

    let rooms: Value = harness.client.get("/rooms").await.unwrap();

    assert_eq!(rooms, json!([]));
    let failures = recorder.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, RenewalErrorKind::NetworkOrOther);
    assert_eq!(failures[0].http_status, Some(503));
}

#[tokio::test]
async fn retry_replays_method_body_and_headers() {
    let harness = Harness::start().await;
    let original = valid_token();
    harness.seed(&original, "refresh-0");
    let renewed = CredentialPair::new(valid_token(), "refresh-1");
    harness.mount_refresh("refresh-0", &renewed, 0, 1).await;

    Mock::given(method("PUT"))
        .and(header("authorization", format!("Bearer {original}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&harness.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rooms/7"))
        .and(header("x-request-id", "abc"))
        .and(header("authorization", format!("Bearer {}", renewed.access_token).as_str()))
        .and(wiremock::matchers::body_json(json!({ "name": "Lobby" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let request = ApiRequest::put("/rooms/7")
        .json(&json!({ "name": "Lobby" }))
        .unwrap()
        .header(
            reqwest::header::HeaderName::from_static("x-request-id"),
            reqwest::header::HeaderValue::from_static("abc"),
        );
    let updated: Value = harness.client.execute(request).await.unwrap();
    assert_eq!(updated, json!({ "id": 7 }));
}
