//! Redirect endpoint: status mapping and the full authorization flow.

mod common;

use axum::http::StatusCode;
use common::{Harness, state_of};
use meb_core::{OAuthCredential, Store};
use serde_json::{Value, json};

fn error_of(body: &str) -> String {
    let value: Value = serde_json::from_str(body).unwrap();
    value["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::start().await;
    let (status, body) = harness.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_provider_error_is_bad_request() {
    let harness = Harness::start().await;
    let (status, body) = harness
        .get("/redirect?error=access_denied&state=abc")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "access_denied");
}

#[tokio::test]
async fn test_missing_code_or_state_is_bad_request() {
    let harness = Harness::start().await;

    for uri in [
        "/redirect",
        "/redirect?code=abc",
        "/redirect?state=abc",
        "/redirect?code=&state=abc",
        "/redirect?code=abc&state=",
    ] {
        let (status, body) = harness.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error_of(&body), "code or/and state are empty");
    }
}

#[tokio::test]
async fn test_unknown_state_is_bad_request() {
    let harness = Harness::start().await;
    let (status, body) = harness.get("/redirect?code=abc&state=deadbeef").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!error_of(&body).is_empty());
}

#[tokio::test]
async fn test_full_flow_then_replay() {
    let harness = Harness::start().await;
    harness
        .mount_token_endpoint(
            200,
            json!({
                "access_token": "at-1",
                "token_type": "Bearer",
                "refresh_token": "rt-1",
                "expires_in": 3600
            }),
        )
        .await;
    harness.mount_send_message(42, 1).await;

    let url = harness.service.start_flow(42, "en").await.unwrap();
    let state = state_of(&url);
    assert_eq!(harness.store.pending_count().await, 1);

    let (status, body) = harness
        .get(&format!("/redirect?code=auth-code&state={state}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Authorization complete"));
    assert_eq!(harness.store.pending_count().await, 0);

    let user = harness.store.get_user(42).await.unwrap();
    let credential = OAuthCredential::decode(user.credential.as_deref().unwrap()).unwrap();
    assert_eq!(credential.access_token, "at-1");
    assert_eq!(credential.refresh_token.as_deref(), Some("rt-1"));

    let (status, _) = harness
        .get(&format!("/redirect?code=auth-code&state={state}"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    harness
        .mount_jmap(
            "at-1",
            json!({
                "accountId": "u1",
                "created": {"k1": {
                    "id": "masked-1",
                    "email": "example.x1y2@fastmail.com",
                    "forDomain": "https://www.example.com",
                    "state": "pending"
                }}
            }),
        )
        .await;

    let alias = harness
        .service
        .create_alias(42, "https://www.example.com/signup")
        .await
        .unwrap();
    assert_eq!(alias.id, "masked-1");
    assert_eq!(alias.email, "example.x1y2@fastmail.com");
}

#[tokio::test]
async fn test_token_exchange_failure_is_internal_error() {
    let harness = Harness::start().await;
    harness
        .mount_token_endpoint(400, json!({"error": "invalid_grant"}))
        .await;
    // The user is told the authorization failed.
    harness.mount_send_message(7, 1).await;

    let url = harness.service.start_flow(7, "en").await.unwrap();
    let (status, body) = harness
        .get(&format!("/redirect?code=bad&state={}", state_of(&url)))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!error_of(&body).is_empty());

    let user = harness.store.get_user(7).await.unwrap();
    assert!(user.credential.is_none());
}
