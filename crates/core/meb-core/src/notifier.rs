//! Outbound messaging to users.

use crate::error::Result;
use crate::types::User;
use async_trait::async_trait;

/// Notices the core sends to a user outside of a direct reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    AuthorizationComplete,
    AuthorizationFailed,
}

/// Delivers localized notices to a user on the messaging platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `notice` to `user`, localized for their stored language code.
    ///
    /// Delivery failures are reported as [`crate::Error::NotifyInternal`].
    async fn notify(&self, user: &User, notice: Notice) -> Result<()>;
}
