//! Persistence contract for users and pending authorizations.

use crate::error::{Error, Result};
use crate::types::{PendingAuthorization, User, UserId};
use async_trait::async_trait;
use tracing::debug;

/// Storage for users, their credentials and one-time authorization state.
///
/// Implementations must make every operation atomic per key: two concurrent
/// [`Store::take_pending_authorization`] calls for the same state can never
/// both succeed, and concurrent creates for one user converge to one record.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user. Fails with [`Error::StoreDuplicateUser`] if present.
    async fn create_user(&self, user_id: UserId, language_code: &str) -> Result<()>;

    async fn update_language_code(&self, user_id: UserId, language_code: &str) -> Result<()>;

    /// Replace the stored credential blob. Fails with [`Error::NoUser`] if absent.
    async fn update_credential(&self, user_id: UserId, credential: &str) -> Result<()>;

    /// Fetch a user. Fails with [`Error::NoUser`] if absent.
    async fn get_user(&self, user_id: UserId) -> Result<User>;

    async fn create_pending_authorization(&self, pending: PendingAuthorization) -> Result<()>;

    /// Retrieve and remove a pending authorization by its state parameter.
    ///
    /// Unknown and expired states both fail with [`Error::NoState`].
    async fn take_pending_authorization(&self, state: &str) -> Result<PendingAuthorization>;

    /// Drop expired pending authorizations, returning how many were removed.
    async fn cleanup_expired(&self) -> Result<usize>;

    /// Create the user, or refresh its language code if it already exists.
    async fn upsert_user(&self, user_id: UserId, language_code: &str) -> Result<()> {
        match self.create_user(user_id, language_code).await {
            Err(Error::StoreDuplicateUser) => {
                debug!(user_id, "User already exists, updating language code");
                self.update_language_code(user_id, language_code).await
            }
            other => other,
        }
    }
}
