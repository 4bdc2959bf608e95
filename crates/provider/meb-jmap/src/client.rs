//! Masked email calls over JMAP.

use crate::config::JmapConfig;
use crate::error::{JmapError, JmapResult};
use crate::prefix::email_prefix_for;
use crate::types::{
    Invocation, MaskedEmail, MaskedEmailSet, MaskedEmailSetResponse, MethodError, Request,
    Response, SessionResource,
};
use meb_core::{AliasState, MaskedEmailAlias};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const SET_METHOD: &str = "MaskedEmail/set";
const CALL_ID: &str = "0";
const CREATE_KEY: &str = "k1";

/// Account and endpoint resolved from the session resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub account_id: String,
    pub api_url: String,
}

/// JMAP client bound to one provider configuration.
///
/// Nothing is cached between calls: every operation starts with session
/// discovery using the caller's bearer token.
#[derive(Clone)]
pub struct JmapClient {
    http_client: Client,
    config: Arc<JmapConfig>,
}

impl JmapClient {
    pub fn new(config: Arc<JmapConfig>) -> JmapResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        Ok(Self::with_http_client(http_client, config))
    }

    pub fn with_http_client(http_client: Client, config: Arc<JmapConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &JmapConfig {
        &self.config
    }

    /// Fetch the session resource and pick the masked email account.
    #[instrument(skip_all)]
    pub async fn open_session(&self, access_token: &str) -> JmapResult<SessionInfo> {
        let response = self
            .http_client
            .get(&self.config.session_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let session: SessionResource = read_json(response, "session").await?;

        let account_id = session
            .primary_accounts
            .get(&self.config.capability)
            .cloned()
            .ok_or_else(|| JmapError::CapabilityNotFound(self.config.capability.clone()))?;

        let api_url = session
            .api_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.config.api_url.clone());

        debug!(%account_id, %api_url, "JMAP session opened");
        Ok(SessionInfo {
            account_id,
            api_url,
        })
    }

    /// Create a masked email for a URL-like target.
    ///
    /// The prefix is derived before any request is made, so an unusable target
    /// never reaches the provider.
    pub async fn create_alias(&self, access_token: &str, target: &str) -> JmapResult<MaskedEmailAlias> {
        let target = email_prefix_for(target)?;
        let session = self.open_session(access_token).await?;
        self.create_masked_email(access_token, &session, &target.for_domain, &target.email_prefix)
            .await
    }

    /// Create a masked email with a caller-chosen prefix and no domain.
    pub async fn create_alias_with_prefix(
        &self,
        access_token: &str,
        email_prefix: &str,
    ) -> JmapResult<MaskedEmailAlias> {
        let session = self.open_session(access_token).await?;
        self.create_masked_email(access_token, &session, "", email_prefix)
            .await
    }

    /// Move a masked email from `pending` to `enabled`.
    pub async fn enable_alias(&self, access_token: &str, alias_id: &str) -> JmapResult<()> {
        let session = self.open_session(access_token).await?;
        self.enable_masked_email(access_token, &session, alias_id)
            .await
    }

    #[instrument(skip(self, access_token, session), fields(account_id = %session.account_id))]
    pub async fn create_masked_email(
        &self,
        access_token: &str,
        session: &SessionInfo,
        for_domain: &str,
        email_prefix: &str,
    ) -> JmapResult<MaskedEmailAlias> {
        let mut create = HashMap::new();
        create.insert(
            CREATE_KEY.to_string(),
            MaskedEmail {
                for_domain: Some(for_domain.to_string()).filter(|d| !d.is_empty()),
                email_prefix: Some(email_prefix.to_string()).filter(|p| !p.is_empty()),
                ..Default::default()
            },
        );

        let result = self
            .set(
                access_token,
                session,
                MaskedEmailSet {
                    account_id: session.account_id.clone(),
                    create: Some(create),
                    update: None,
                },
            )
            .await?;

        if let Some(set_error) = result.not_created(CREATE_KEY) {
            error!("Masked email was not created: {}", set_error);
            return Err(JmapError::SetRejected(set_error.clone()));
        }

        let created = result.created(CREATE_KEY).ok_or_else(|| {
            error!("Masked email response has no created entry");
            JmapError::InvalidResponse(format!("no created entry for {CREATE_KEY}"))
        })?;

        let (Some(id), Some(email)) = (
            created.id.clone().filter(|id| !id.is_empty()),
            created.email.clone().filter(|email| !email.is_empty()),
        ) else {
            error!("Created masked email lacks id or address");
            return Err(JmapError::InvalidResponse(
                "created entry lacks id or email".to_string(),
            ));
        };

        info!(alias_id = %id, "Masked email created");
        Ok(MaskedEmailAlias {
            id,
            email,
            for_domain: created
                .for_domain
                .clone()
                .unwrap_or_else(|| for_domain.to_string()),
            email_prefix: created
                .email_prefix
                .clone()
                .unwrap_or_else(|| email_prefix.to_string()),
            state: created.state.unwrap_or(AliasState::Pending),
        })
    }

    #[instrument(skip(self, access_token, session), fields(account_id = %session.account_id))]
    pub async fn enable_masked_email(
        &self,
        access_token: &str,
        session: &SessionInfo,
        alias_id: &str,
    ) -> JmapResult<()> {
        let mut update = HashMap::new();
        update.insert(
            alias_id.to_string(),
            MaskedEmail {
                state: Some(AliasState::Enabled),
                ..Default::default()
            },
        );

        let result = self
            .set(
                access_token,
                session,
                MaskedEmailSet {
                    account_id: session.account_id.clone(),
                    create: None,
                    update: Some(update),
                },
            )
            .await?;

        if let Some(set_error) = result.not_updated(alias_id) {
            error!("Masked email was not enabled: {}", set_error);
            return Err(JmapError::SetRejected(set_error.clone()));
        }

        if !result.is_updated(alias_id) {
            error!("Masked email response does not list the alias as updated");
            return Err(JmapError::InvalidResponse(format!(
                "{alias_id} missing from updated"
            )));
        }

        info!("Masked email enabled");
        Ok(())
    }

    /// Send a single `MaskedEmail/set` call and return its result.
    async fn set(
        &self,
        access_token: &str,
        session: &SessionInfo,
        arguments: MaskedEmailSet,
    ) -> JmapResult<MaskedEmailSetResponse> {
        let request = Request {
            using: vec![self.config.capability.clone()],
            method_calls: vec![Invocation::new(SET_METHOD, arguments, CALL_ID)],
        };

        let response = self
            .http_client
            .post(&session.api_url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;

        let envelope: Response<serde_json::Value> = read_json(response, "method call").await?;
        let invocation = envelope
            .method_responses
            .into_iter()
            .find(|invocation| invocation.call_id == CALL_ID)
            .ok_or_else(|| {
                error!("Batch response has no result for call {}", CALL_ID);
                JmapError::InvalidResponse(format!("no response for call {CALL_ID}"))
            })?;

        let name = invocation.name.clone();
        match name.as_str() {
            SET_METHOD => Ok(decode_arguments::<MaskedEmailSetResponse>(invocation)?.arguments),
            "error" => {
                let method_error: Invocation<MethodError> = decode_arguments(invocation)?;
                error!("{} failed: {}", SET_METHOD, method_error.arguments);
                Err(JmapError::Method(method_error.arguments))
            }
            other => Err(JmapError::InvalidResponse(format!(
                "unexpected method response {other}"
            ))),
        }
    }
}

fn decode_arguments<T: DeserializeOwned>(invocation: Invocation<serde_json::Value>) -> JmapResult<Invocation<T>> {
    invocation
        .decode_arguments()
        .map_err(|e| JmapError::InvalidResponse(e.to_string()))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> JmapResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), "JMAP {} request failed: {}", what, body);
        return Err(JmapError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        error!("Invalid JMAP {} response: {}", what, e);
        JmapError::InvalidResponse(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meb_core::ProviderErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, JmapClient) {
        let server = MockServer::start().await;
        let config = JmapConfig::with_endpoints(
            format!("{}/jmap/session", server.uri()),
            format!("{}/jmap/api/", server.uri()),
        );
        let client = JmapClient::new(Arc::new(config)).unwrap();
        (server, client)
    }

    async fn mount_session(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/jmap/session"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn session_body() -> serde_json::Value {
        json!({
            "primaryAccounts": {
                "urn:ietf:params:jmap:core": "u1",
                "https://www.fastmail.com/dev/maskedemail": "u1"
            }
        })
    }

    fn set_response(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "methodResponses": [["MaskedEmail/set", result, "0"]],
            "sessionState": "s1"
        }))
    }

    #[tokio::test]
    async fn test_open_session_prefers_advertised_api_url() {
        let (server, client) = setup().await;
        mount_session(
            &server,
            json!({
                "primaryAccounts": {"https://www.fastmail.com/dev/maskedemail": "u7"},
                "apiUrl": "https://elsewhere.example/api/"
            }),
        )
        .await;

        let session = client.open_session("token").await.unwrap();
        assert_eq!(session.account_id, "u7");
        assert_eq!(session.api_url, "https://elsewhere.example/api/");
    }

    #[tokio::test]
    async fn test_open_session_without_capability() {
        let (server, client) = setup().await;
        mount_session(&server, json!({"primaryAccounts": {"urn:ietf:params:jmap:core": "u1"}})).await;

        let err = client.open_session("token").await.unwrap_err();
        assert!(matches!(err, JmapError::CapabilityNotFound(_)));
    }

    #[tokio::test]
    async fn test_session_status_is_classified() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/jmap/session"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client.open_session("token").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::AuthExpired);
    }

    #[tokio::test]
    async fn test_malformed_session_is_internal() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/jmap/session"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client.open_session("token").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_create_alias() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .and(header("Authorization", "Bearer token"))
            .and(body_partial_json(json!({
                "using": ["https://www.fastmail.com/dev/maskedemail"],
                "methodCalls": [[
                    "MaskedEmail/set",
                    {
                        "accountId": "u1",
                        "create": {"k1": {"forDomain": "https://shop.example.com", "emailPrefix": "example"}}
                    },
                    "0"
                ]]
            })))
            .respond_with(set_response(json!({
                "accountId": "u1",
                "created": {"k1": {"id": "me-1", "email": "example.abc12@fastmail.com", "state": "pending"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let alias = client
            .create_alias("token", "https://shop.example.com/cart")
            .await
            .unwrap();

        assert_eq!(alias.id, "me-1");
        assert_eq!(alias.email, "example.abc12@fastmail.com");
        assert_eq!(alias.for_domain, "https://shop.example.com");
        assert_eq!(alias.email_prefix, "example");
        assert_eq!(alias.state, AliasState::Pending);
    }

    #[tokio::test]
    async fn test_create_alias_with_prefix_omits_domain() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .and(body_partial_json(json!({
                "methodCalls": [["MaskedEmail/set", {"create": {"k1": {"emailPrefix": "news"}}}, "0"]]
            })))
            .respond_with(set_response(json!({
                "created": {"k1": {"id": "me-2", "email": "news.x1@fastmail.com"}}
            })))
            .mount(&server)
            .await;

        let alias = client.create_alias_with_prefix("token", "news").await.unwrap();
        assert_eq!(alias.email, "news.x1@fastmail.com");
        assert_eq!(alias.for_domain, "");
    }

    #[tokio::test]
    async fn test_missing_created_entry_is_internal() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .respond_with(set_response(json!({"accountId": "u1", "created": {}})))
            .mount(&server)
            .await;

        let err = client.create_alias("token", "https://example.com").await.unwrap_err();
        assert!(matches!(err, JmapError::InvalidResponse(_)));
        assert_eq!(err.kind(), ProviderErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_not_created_is_classified() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .respond_with(set_response(json!({
                "notCreated": {"k1": {"type": "rateLimit", "description": "too many"}}
            })))
            .mount(&server)
            .await;

        let err = client.create_alias("token", "https://example.com").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_method_error_is_classified() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "methodResponses": [["error", {"type": "accountNotFound"}, "0"]],
                "sessionState": "s1"
            })))
            .mount(&server)
            .await;

        let err = client.create_alias("token", "https://example.com").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::AuthExpired);
    }

    #[tokio::test]
    async fn test_invalid_target_makes_no_requests() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
            .expect(0)
            .mount(&server)
            .await;

        let err = client.create_alias("token", "https://").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_enable_alias() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .and(body_partial_json(json!({
                "methodCalls": [["MaskedEmail/set", {"accountId": "u1", "update": {"me-1": {"state": "enabled"}}}, "0"]]
            })))
            .respond_with(set_response(json!({"updated": {"me-1": null}})))
            .expect(1)
            .mount(&server)
            .await;

        client.enable_alias("token", "me-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_enable_alias_requires_updated_entry() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .respond_with(set_response(json!({"updated": {}})))
            .mount(&server)
            .await;

        let err = client.enable_alias("token", "me-1").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_enable_alias_not_found() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .respond_with(set_response(json!({"notUpdated": {"me-1": {"type": "notFound"}}})))
            .mount(&server)
            .await;

        let err = client.enable_alias("token", "me-1").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_rate_limited_api_call() {
        let (server, client) = setup().await;
        mount_session(&server, session_body()).await;

        Mock::given(method("POST"))
            .and(path("/jmap/api/"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client.enable_alias("token", "me-1").await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::RateLimited);
    }
}
