//! Shared fixtures: one mock server stands in for the OAuth2 provider, the
//! JMAP API and the Telegram Bot API.

#![allow(dead_code)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use meb_core::{OAuthCredential, Store, UserId};
use meb_identity_oauth2::{OAuth2ProviderConfig, TokenExchangeCoordinator};
use meb_jmap::{JmapClient, JmapConfig};
use meb_server::{MaskedEmailService, Messages, TelegramNotifier, router};
use meb_store::InMemoryStore;
use meb_telegram::TelegramClient;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BOT_TOKEN: &str = "tok";

pub struct Harness {
    pub server: MockServer,
    pub store: InMemoryStore,
    pub service: MaskedEmailService,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let store = InMemoryStore::new();
        let shared: Arc<dyn Store> = Arc::new(store.clone());

        let oauth2 = OAuth2ProviderConfig::new("client-id", "https://bot.example/redirect")
            .with_endpoints(
                format!("{}/oauth/authorize", server.uri()),
                format!("{}/oauth/refresh", server.uri()),
            );
        let notifier = TelegramNotifier::new(
            TelegramClient::with_api_base_url(&server.uri(), BOT_TOKEN),
            Arc::new(Messages::embedded().unwrap()),
        );
        let coordinator =
            TokenExchangeCoordinator::new(Arc::new(oauth2), shared.clone(), Arc::new(notifier))
                .unwrap();

        let jmap = JmapClient::new(Arc::new(JmapConfig::with_endpoints(
            format!("{}/jmap/session", server.uri()),
            format!("{}/jmap/api/", server.uri()),
        )))
        .unwrap();

        let service = MaskedEmailService::new(shared, coordinator, jmap);

        Self {
            server,
            store,
            service,
        }
    }

    /// Send a GET through the router and return status and body.
    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = router(self.service.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    /// Store a non-expiring credential for `user_id`.
    pub async fn authorize(&self, user_id: UserId, access_token: &str) {
        self.store.upsert_user(user_id, "en").await.unwrap();
        let credential = OAuthCredential {
            access_token: access_token.to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expiry: None,
        };
        self.store
            .update_credential(user_id, &credential.encode().unwrap())
            .await
            .unwrap();
    }

    pub async fn mount_send_message(&self, chat_id: UserId, times: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/bot{BOT_TOKEN}/sendMessage")))
            .and(wiremock::matchers::body_partial_json(json!({"chat_id": chat_id})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 1, "chat": {"id": chat_id, "type": "private"}, "date": 0}
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_token_endpoint(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/oauth/refresh"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_jmap(&self, access_token: &str, set_response: Value) {
        Mock::given(method("GET"))
            .and(path("/jmap/session"))
            .and(bearer_token(access_token))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "primaryAccounts": {
                    "urn:ietf:params:jmap:core": "u1",
                    "https://www.fastmail.com/dev/maskedemail": "u1"
                },
                "apiUrl": format!("{}/jmap/api/", self.server.uri())
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .and(bearer_token(access_token))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "methodResponses": [["MaskedEmail/set", set_response, "0"]],
                "sessionState": "state-1"
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }
}

/// The `state` query parameter of an authorization URL.
pub fn state_of(url: &str) -> String {
    url.split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("state="))
        .unwrap()
        .to_string()
}
