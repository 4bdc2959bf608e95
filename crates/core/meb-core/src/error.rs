//! Coarse error kinds surfaced to the orchestration layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Category of a failure reported by the mail provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderErrorKind {
    /// The bearer credential was rejected or the account is no longer reachable.
    AuthExpired,
    RateLimited,
    InvalidArgument,
    /// Catch-all for transport, status and protocol faults.
    Internal,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderErrorKind::AuthExpired => "auth expired",
            ProviderErrorKind::RateLimited => "rate limited",
            ProviderErrorKind::InvalidArgument => "invalid argument",
            ProviderErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("User not found")]
    NoUser,

    #[error("User has no stored credential")]
    NoToken,

    #[error("Authorization state not found or expired")]
    NoState,

    #[error("Random generation failed: {0}")]
    RandomGeneration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("Masked email capability not available for this account")]
    ProviderCapabilityNotFound,

    #[error("Store error: {0}")]
    StoreInternal(String),

    #[error("User already exists")]
    StoreDuplicateUser,

    #[error("Notification failed: {0}")]
    NotifyInternal(String),
}

impl Error {
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Error::Provider {
            kind,
            message: message.into(),
        }
    }

    pub fn provider_internal(message: impl Into<String>) -> Self {
        Self::provider(ProviderErrorKind::Internal, message)
    }

    /// Provider category, if this is a provider failure.
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            Error::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the user has to (re)run the authorization flow to recover.
    pub fn requires_authorization(&self) -> bool {
        matches!(
            self,
            Error::NoUser
                | Error::NoToken
                | Error::Provider {
                    kind: ProviderErrorKind::AuthExpired,
                    ..
                }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_is_exposed() {
        let err = Error::provider(ProviderErrorKind::RateLimited, "slow down");
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::RateLimited));
        assert_eq!(err.to_string(), "Provider error (rate limited): slow down");
        assert_eq!(Error::NoState.provider_kind(), None);
    }

    #[test]
    fn test_requires_authorization() {
        assert!(Error::NoToken.requires_authorization());
        assert!(Error::NoUser.requires_authorization());
        assert!(Error::provider(ProviderErrorKind::AuthExpired, "401").requires_authorization());
        assert!(!Error::provider_internal("boom").requires_authorization());
        assert!(!Error::ProviderCapabilityNotFound.requires_authorization());
    }
}
