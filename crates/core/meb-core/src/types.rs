//! Data model shared by the store, the coordinator and the provider client.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Numeric messaging-platform identity of a user.
pub type UserId = i64;

/// A bot user and the opaque credential obtained for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub language_code: String,
    /// Serialized [`OAuthCredential`]; the store never interprets it.
    pub credential: Option<String>,
}

impl User {
    pub fn new(id: UserId, language_code: impl Into<String>) -> Self {
        Self {
            id,
            language_code: language_code.into(),
            credential: None,
        }
    }
}

/// One-time state/verifier pair created when a user starts the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub fn new(state: String, code_verifier: String, user_id: UserId, ttl_seconds: u64) -> Self {
        let created_at = Utc::now();
        let expires_at = after_seconds(created_at, ttl_seconds).unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            state,
            code_verifier,
            user_id,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// `now + seconds`, or `None` when the result does not fit a timestamp.
pub fn after_seconds(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Token material returned by the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredential {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl OAuthCredential {
    /// Seconds before the recorded expiry at which the token is treated as stale.
    pub const EXPIRY_LEEWAY_SECONDS: i64 = 30;

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(Self::EXPIRY_LEEWAY_SECONDS) >= expiry,
            None => false,
        }
    }

    pub fn encode(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(blob: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }
}

/// Lifecycle of a masked email address on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasState {
    Pending,
    Enabled,
    Disabled,
    Deleted,
}

/// Masked email address as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedEmailAlias {
    pub id: String,
    pub email: String,
    pub for_domain: String,
    pub email_prefix: String,
    pub state: AliasState,
}
