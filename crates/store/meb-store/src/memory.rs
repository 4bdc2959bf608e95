//! In-memory store.

use crate::state::StoreState;
use async_trait::async_trait;
use meb_core::{PendingAuthorization, Result, Store, User, UserId};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`Store`]
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending authorizations currently held.
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    /// Look at a pending authorization without consuming it.
    pub async fn peek_pending_authorization(&self, state: &str) -> Option<PendingAuthorization> {
        self.state.read().await.pending.get(state).cloned()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_user(&self, user_id: UserId, language_code: &str) -> Result<()> {
        self.state.write().await.create_user(user_id, language_code)
    }

    async fn update_language_code(&self, user_id: UserId, language_code: &str) -> Result<()> {
        self.state
            .write()
            .await
            .update_language_code(user_id, language_code)
    }

    async fn update_credential(&self, user_id: UserId, credential: &str) -> Result<()> {
        self.state.write().await.update_credential(user_id, credential)
    }

    async fn get_user(&self, user_id: UserId) -> Result<User> {
        self.state.read().await.get_user(user_id)
    }

    async fn create_pending_authorization(&self, pending: PendingAuthorization) -> Result<()> {
        self.state.write().await.insert_pending(pending)
    }

    async fn take_pending_authorization(&self, state: &str) -> Result<PendingAuthorization> {
        self.state.write().await.take_pending(state)
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        Ok(self.state.write().await.cleanup_expired())
    }
}
