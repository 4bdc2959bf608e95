//! Authorization code flow with PKCE, split across two entry points.
//!
//! [`TokenExchangeCoordinator::begin_authorization`] runs when the user asks
//! the bot to connect their account; it persists a one-time state/verifier
//! pair and returns the provider URL. The provider later redirects the browser
//! to our HTTP endpoint, which calls
//! [`TokenExchangeCoordinator::complete_authorization`] with the code and the
//! state. The two calls share nothing but the store.

use crate::config::OAuth2ProviderConfig;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::pkce::{CODE_CHALLENGE_METHOD, PkceChallenge, STATE_BYTES, random_hex};
use crate::types::TokenResponse;
use chrono::Utc;
use meb_core::{
    Error, Notice, Notifier, OAuthCredential, PendingAuthorization, Result, Store, User, UserId,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Clone)]
pub struct TokenExchangeCoordinator {
    http_client: Client,
    config: Arc<OAuth2ProviderConfig>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl TokenExchangeCoordinator {
    pub fn new(
        config: Arc<OAuth2ProviderConfig>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> OAuth2Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            config,
            store,
            notifier,
        })
    }

    pub fn config(&self) -> &OAuth2ProviderConfig {
        &self.config
    }

    /// Start the flow for `user_id` and return the provider authorization URL.
    ///
    /// The pending authorization is stored before the URL is handed out, so
    /// the redirect can never arrive ahead of its state.
    #[instrument(skip(self))]
    pub async fn begin_authorization(&self, user_id: UserId, language_code: &str) -> Result<String> {
        self.store.upsert_user(user_id, language_code).await?;

        let pkce = PkceChallenge::generate()?;
        let state = random_hex(STATE_BYTES)?;

        let url = self.authorization_url(&state, &pkce.code_challenge)?;

        self.store
            .create_pending_authorization(PendingAuthorization::new(
                state,
                pkce.code_verifier,
                user_id,
                self.config.state_ttl_seconds,
            ))
            .await?;

        debug!("Generated authorization URL");
        Ok(url)
    }

    /// Finish the flow for the redirect carrying `code` and `state`.
    ///
    /// The state is consumed before anything else happens; an unknown, expired
    /// or replayed state fails with [`Error::NoState`] and changes nothing.
    #[instrument(skip_all)]
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<()> {
        let pending = self.store.take_pending_authorization(state).await?;
        let user = self.store.get_user(pending.user_id).await?;

        let token = match self.exchange_code(code, &pending.code_verifier).await {
            Ok(token) => token,
            Err(e) => {
                if let Err(notify_err) = self.notifier.notify(&user, Notice::AuthorizationFailed).await {
                    warn!("Failed to tell the user about the failed authorization: {}", notify_err);
                }
                return Err(e.into());
            }
        };

        let credential = token.into_credential(Utc::now());
        self.store
            .update_credential(user.id, &credential.encode()?)
            .await?;

        info!(user_id = user.id, "Authorization completed");
        self.notifier
            .notify(&user, Notice::AuthorizationComplete)
            .await
    }

    /// The user's credential, refreshed first if it has expired.
    ///
    /// Never touches the network for a user without a credential.
    #[instrument(skip_all, fields(user_id = user.id))]
    pub async fn valid_credential(&self, user: &User) -> Result<OAuthCredential> {
        let blob = user.credential.as_deref().ok_or(Error::NoToken)?;
        let credential = OAuthCredential::decode(blob)?;

        if !credential.is_expired() {
            return Ok(credential);
        }

        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            // Nothing to refresh with; let the provider reject it.
            debug!("Credential expired and has no refresh token");
            return Ok(credential);
        };

        let token = self.refresh(refresh_token).await?;
        let mut refreshed = token.into_credential(Utc::now());
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = credential.refresh_token.clone();
        }

        self.store
            .update_credential(user.id, &refreshed.encode()?)
            .await?;

        info!("Credential refreshed");
        Ok(refreshed)
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> OAuth2Result<String> {
        let mut url = Url::parse(&self.config.authorization_endpoint)?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);

        Ok(url.to_string())
    }

    /// Exchange authorization code for tokens
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> OAuth2Result<TokenResponse> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Token exchange failed: {}", error_text);
            return Err(OAuth2Error::TokenExchangeFailed {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuth2Error::InvalidTokenResponse(e.to_string()))?;

        info!("Successfully exchanged code for tokens");
        Ok(token_response)
    }

    async fn refresh(&self, refresh_token: &str) -> OAuth2Result<TokenResponse> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!("Token refresh request failed: {}", e);
                OAuth2Error::RefreshFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Token refresh rejected: {}", error_text);
            return Err(OAuth2Error::RefreshFailed(error_text));
        }

        response
            .json()
            .await
            .map_err(|e| OAuth2Error::RefreshFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkce::code_challenge;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use meb_core::ProviderErrorKind;
    use meb_store::InMemoryStore;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<(UserId, Notice)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user: &User, notice: Notice) -> Result<()> {
            self.notices.lock().unwrap().push((user.id, notice));
            Ok(())
        }
    }

    struct Harness {
        server: MockServer,
        store: InMemoryStore,
        notifier: Arc<RecordingNotifier>,
        coordinator: TokenExchangeCoordinator,
    }

    async fn setup() -> Harness {
        let server = MockServer::start().await;
        let config = OAuth2ProviderConfig::new("client-1", "https://bot.example/redirect")
            .with_endpoints(
                format!("{}/oauth/authorize", server.uri()),
                format!("{}/oauth/refresh", server.uri()),
            );

        let store = InMemoryStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator =
            TokenExchangeCoordinator::new(Arc::new(config), Arc::new(store.clone()), notifier.clone())
                .unwrap();

        Harness {
            server,
            store,
            notifier,
            coordinator,
        }
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    async fn mount_token(server: &MockServer, grant_type: &str, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/oauth/refresh"))
            .and(body_string_contains(format!("grant_type={grant_type}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_authorization_url_generation() {
        let h = setup().await;
        let url = h.coordinator.begin_authorization(7, "en").await.unwrap();

        let params = query(&url);
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["redirect_uri"], "https://bot.example/redirect");
        assert_eq!(
            params["scope"],
            "urn:ietf:params:jmap:core https://www.fastmail.com/dev/maskedemail"
        );
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["state"].len(), 48);

        let pending = h
            .store
            .peek_pending_authorization(&params["state"])
            .await
            .expect("state stored before the URL is returned");
        assert_eq!(pending.user_id, 7);
        assert_eq!(params["code_challenge"], code_challenge(&pending.code_verifier));
    }

    #[tokio::test]
    async fn test_begin_twice_refreshes_language() {
        let h = setup().await;
        h.coordinator.begin_authorization(7, "en").await.unwrap();
        h.coordinator.begin_authorization(7, "ru").await.unwrap();

        assert_eq!(h.store.get_user(7).await.unwrap().language_code, "ru");
        assert_eq!(h.store.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_states_and_verifiers_never_repeat() {
        let h = setup().await;
        let mut states = HashSet::new();
        let mut verifiers = HashSet::new();

        for _ in 0..100_000 {
            let url = h.coordinator.begin_authorization(1, "en").await.unwrap();
            let state = query(&url).remove("state").unwrap();
            let pending = h.store.take_pending_authorization(&state).await.unwrap();
            assert!(states.insert(state));
            assert!(verifiers.insert(pending.code_verifier));
        }
    }

    #[tokio::test]
    async fn test_full_flow() {
        let h = setup().await;

        Mock::given(method("POST"))
            .and(path("/oauth/refresh"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("code_verifier="))
            .and(body_string_contains("client_id=client-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "rt-1"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let url = h.coordinator.begin_authorization(7, "en").await.unwrap();
        let state = query(&url).remove("state").unwrap();

        h.coordinator
            .complete_authorization("auth-code", &state)
            .await
            .unwrap();

        let user = h.store.get_user(7).await.unwrap();
        let credential = OAuthCredential::decode(user.credential.as_deref().unwrap()).unwrap();
        assert_eq!(credential.access_token, "at-1");
        assert_eq!(credential.refresh_token.as_deref(), Some("rt-1"));
        assert!(credential.expiry.is_some());

        let notices = h.notifier.notices.lock().unwrap().clone();
        assert_eq!(notices, vec![(7, Notice::AuthorizationComplete)]);

        // Replaying the redirect must not exchange the code a second time.
        let replay = h.coordinator.complete_authorization("auth-code", &state).await;
        assert!(matches!(replay, Err(Error::NoState)));
    }

    #[tokio::test]
    async fn test_unknown_state_changes_nothing() {
        let h = setup().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        h.store.upsert_user(7, "en").await.unwrap();
        let result = h.coordinator.complete_authorization("code", "nope").await;

        assert!(matches!(result, Err(Error::NoState)));
        assert!(h.store.get_user(7).await.unwrap().credential.is_none());
        assert!(h.notifier.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_endpoint_failure() {
        let h = setup().await;
        Mock::given(method("POST"))
            .and(path("/oauth/refresh"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&h.server)
            .await;

        let url = h.coordinator.begin_authorization(7, "en").await.unwrap();
        let state = query(&url).remove("state").unwrap();

        let err = h
            .coordinator
            .complete_authorization("bad", &state)
            .await
            .unwrap_err();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::Internal));
        assert!(h.store.get_user(7).await.unwrap().credential.is_none());

        let notices = h.notifier.notices.lock().unwrap().clone();
        assert_eq!(notices, vec![(7, Notice::AuthorizationFailed)]);
    }

    #[tokio::test]
    async fn test_valid_credential_without_token() {
        let h = setup().await;
        let result = h.coordinator.valid_credential(&User::new(7, "en")).await;
        assert!(matches!(result, Err(Error::NoToken)));
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed() {
        let h = setup().await;
        mount_token(
            &h.server,
            "refresh_token",
            serde_json::json!({"access_token": "at-2", "token_type": "Bearer", "expires_in": 3600}),
        )
        .await;

        h.store.upsert_user(7, "en").await.unwrap();
        let stale = OAuthCredential {
            access_token: "at-1".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("rt-1".to_string()),
            expiry: Some(Utc::now() - ChronoDuration::minutes(5)),
        };
        h.store
            .update_credential(7, &stale.encode().unwrap())
            .await
            .unwrap();

        let user = h.store.get_user(7).await.unwrap();
        let fresh = h.coordinator.valid_credential(&user).await.unwrap();
        assert_eq!(fresh.access_token, "at-2");
        assert_eq!(fresh.refresh_token.as_deref(), Some("rt-1"));

        let stored = h.store.get_user(7).await.unwrap();
        let stored = OAuthCredential::decode(stored.credential.as_deref().unwrap()).unwrap();
        assert_eq!(stored, fresh);
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_auth_expired() {
        let h = setup().await;
        Mock::given(method("POST"))
            .and(path("/oauth/refresh"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&h.server)
            .await;

        let mut user = User::new(7, "en");
        user.credential = Some(
            OAuthCredential {
                access_token: "at-1".to_string(),
                token_type: "Bearer".to_string(),
                refresh_token: Some("rt-1".to_string()),
                expiry: Some(Utc::now()),
            }
            .encode()
            .unwrap(),
        );

        let err = h.coordinator.valid_credential(&user).await.unwrap_err();
        assert!(err.requires_authorization());
    }
}
