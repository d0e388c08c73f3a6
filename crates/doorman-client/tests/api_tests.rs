//! Integration tests for the authorized API client

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use doorman_client::api::ApiClient;
use doorman_client::config::AuthConfig;
use doorman_client::error::ClientError;
use doorman_client::gateway::AuthGateway;
use doorman_client::refresh::RefreshCoordinator;
use doorman_core::{SessionStore, TokenGrant};

fn client_for(server_uri: &str, store: &SessionStore) -> ApiClient {
    let config = AuthConfig::new(server_uri).with_error_clear_delay(Duration::from_secs(60));
    let gateway = Arc::new(AuthGateway::new(&config).unwrap());
    let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), gateway, &config));
    ApiClient::new(&config, store.clone(), coordinator).unwrap()
}

fn live_grant(token: &str, now: i64) -> TokenGrant {
    TokenGrant {
        token: token.to_string(),
        expires_in: 3600,
        refresh_token: Some("r1".to_string()),
        refresh_token_expires_at: Some(now + 7200),
        last_login: now,
        last_refreshed: None,
        user: None,
    }
}

fn refresh_payload(token: &str, now: i64) -> serde_json::Value {
    json!({
        "token": token,
        "expires_in": 3600,
        "refresh_token": "r2",
        "refresh_token_expires_in": now + 7200,
        "last_login": now,
        "last_refreshed": now
    })
}

struct NoAuthorizationHeader;

impl wiremock::Match for NoAuthorizationHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

#[tokio::test]
async fn bearer_token_is_attached_from_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    store.apply_login_success(live_grant("t1", Utc::now().timestamp()));
    let api = client_for(&server.uri(), &store);

    let body: serde_json::Value = api.get("/data").await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_expired_calls_share_one_refresh_and_retry_once_each() {
    let server = MockServer::start().await;
    let now = Utc::now().timestamp();

    // Both calls go out with the stale token and come back tagged expired.
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Token expired"}))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(2)
        .mount(&server)
        .await;
    // Retries carry the refreshed token.
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_payload("t2", now))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    store.apply_login_success(live_grant("t1", now));
    let api = client_for(&server.uri(), &store);

    let (first, second) = tokio::join!(
        api.get::<serde_json::Value>("/data"),
        api.get::<serde_json::Value>("/data")
    );
    assert_eq!(first.unwrap()["ok"], true);
    assert_eq!(second.unwrap()["ok"], true);
    assert_eq!(store.snapshot().token.as_deref(), Some("t2"));
}

#[tokio::test]
async fn ordinary_401_propagates_without_a_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "bad signature"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    store.apply_login_success(live_grant("t1", Utc::now().timestamp()));
    let api = client_for(&server.uri(), &store);

    let err = api.get::<serde_json::Value>("/data").await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "bad signature");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // The session is untouched by an ordinary authorization failure.
    assert!(store.snapshot().is_authenticated);
}

#[tokio::test]
async fn a_retried_request_is_never_requeued_into_a_second_refresh() {
    let server = MockServer::start().await;
    let now = Utc::now().timestamp();

    // Expired on the first attempt and on the retry.
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_payload("t2", now)))
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    store.apply_login_success(live_grant("t1", now));
    let api = client_for(&server.uri(), &store);

    let err = api.get::<serde_json::Value>("/data").await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Token expired");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn failed_refresh_surfaces_as_the_original_requests_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "refresh token revoked"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    store.apply_login_success(live_grant("t1", Utc::now().timestamp()));
    let api = client_for(&server.uri(), &store);

    let err = api.get::<serde_json::Value>("/data").await.unwrap_err();
    assert!(matches!(err, ClientError::RefreshFailed { status: 401, .. }));
    assert!(!store.snapshot().is_authenticated);
}

#[tokio::test]
async fn public_posts_carry_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(NoAuthorizationHeader)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let store = SessionStore::new();
    store.apply_login_success(live_grant("t1", Utc::now().timestamp()));
    let api = client_for(&server.uri(), &store);

    let body: serde_json::Value = api
        .post_public("/auth/register", &json!({"username": "bob"}))
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn get_profile_deserializes_the_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1",
            "username": "alice",
            "email": "alice@example.com",
            "theme": "dark"
        })))
        .mount(&server)
        .await;

    let store = SessionStore::new();
    store.apply_login_success(live_grant("t1", Utc::now().timestamp()));
    let api = client_for(&server.uri(), &store);

    let profile = api.get_profile().await.unwrap();
    assert_eq!(profile.id.as_deref(), Some("u1"));
    assert_eq!(profile.username.as_deref(), Some("alice"));
    assert_eq!(profile.extra["theme"], "dark");
}
