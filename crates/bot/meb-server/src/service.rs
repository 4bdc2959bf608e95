//! Orchestration of the authorization flow and masked email operations.
//!
//! Both delivery surfaces, the Telegram bot and the redirect endpoint, call
//! into [`MaskedEmailService`]. Failures are logged here with their context
//! and returned as coarse [`meb_core::Error`] kinds for the caller to turn
//! into a user-facing reply.

use meb_core::{Error, MaskedEmailAlias, Result, Store, UserId};
use meb_identity_oauth2::TokenExchangeCoordinator;
use meb_jmap::JmapClient;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Clone)]
pub struct MaskedEmailService {
    store: Arc<dyn Store>,
    coordinator: TokenExchangeCoordinator,
    jmap: JmapClient,
}

impl MaskedEmailService {
    pub fn new(store: Arc<dyn Store>, coordinator: TokenExchangeCoordinator, jmap: JmapClient) -> Self {
        Self {
            store,
            coordinator,
            jmap,
        }
    }

    /// Register the user and return the URL that connects their account.
    #[instrument(skip(self))]
    pub async fn start_flow(&self, user_id: UserId, language_code: &str) -> Result<String> {
        self.coordinator
            .begin_authorization(user_id, language_code)
            .await
            .inspect_err(|e| log_failure("start authorization", e))
    }

    /// Handle the provider redirect.
    #[instrument(skip_all)]
    pub async fn complete_flow(&self, code: &str, state: &str) -> Result<()> {
        self.coordinator
            .complete_authorization(code, state)
            .await
            .inspect_err(|e| log_failure("complete authorization", e))
    }

    /// Create a masked email for a URL the user sent.
    #[instrument(skip(self))]
    pub async fn create_alias(&self, user_id: UserId, target: &str) -> Result<MaskedEmailAlias> {
        let result: Result<MaskedEmailAlias> = async {
            let access_token = self.access_token(user_id).await?;
            Ok(self.jmap.create_alias(&access_token, target).await?)
        }
        .await;

        let alias = result.inspect_err(|e| log_failure("create masked email", e))?;
        info!(alias_id = %alias.id, for_domain = %alias.for_domain, "Masked email created");
        Ok(alias)
    }

    /// Create a masked email with a user-chosen prefix.
    #[instrument(skip(self))]
    pub async fn create_alias_with_prefix(&self, user_id: UserId, prefix: &str) -> Result<MaskedEmailAlias> {
        let result: Result<MaskedEmailAlias> = async {
            let access_token = self.access_token(user_id).await?;
            Ok(self.jmap.create_alias_with_prefix(&access_token, prefix).await?)
        }
        .await;

        let alias = result.inspect_err(|e| log_failure("create prefixed masked email", e))?;
        info!(alias_id = %alias.id, "Masked email created");
        Ok(alias)
    }

    /// Keep a pending masked email by enabling it.
    #[instrument(skip(self))]
    pub async fn enable_alias(&self, user_id: UserId, alias_id: &str) -> Result<()> {
        let result: Result<()> = async {
            let access_token = self.access_token(user_id).await?;
            Ok(self.jmap.enable_alias(&access_token, alias_id).await?)
        }
        .await;

        result.inspect_err(|e| log_failure("enable masked email", e))?;
        info!("Masked email enabled");
        Ok(())
    }

    /// Drop authorization states nobody completed in time.
    pub async fn purge_expired(&self) -> Result<usize> {
        let removed = self.store.cleanup_expired().await?;
        if removed > 0 {
            info!(removed, "Purged expired authorization states");
        }
        Ok(removed)
    }

    async fn access_token(&self, user_id: UserId) -> Result<String> {
        let user = self.store.get_user(user_id).await?;
        let credential = self.coordinator.valid_credential(&user).await?;
        Ok(credential.access_token)
    }
}

fn log_failure(operation: &str, e: &Error) {
    if e.requires_authorization() || matches!(e, Error::NoState) {
        warn!("Failed to {}: {}", operation, e);
    } else {
        error!("Failed to {}: {}", operation, e);
    }
}
