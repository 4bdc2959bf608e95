//! OAuth2 protocol types.

use chrono::{DateTime, Utc};
use meb_core::{OAuthCredential, after_seconds};
use serde::{Deserialize, Serialize};

/// Query parameters the provider appends to the redirect URI.
///
/// Every field is optional so that a malformed redirect still reaches the
/// handler and can be answered with a proper error body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// OAuth2 token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Turn the response into a storable credential, stamping the expiry
    /// relative to `now`. A lifetime too large to represent is stored as no
    /// expiry.
    pub fn into_credential(self, now: DateTime<Utc>) -> OAuthCredential {
        OAuthCredential {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expiry: self
                .expires_in
                .and_then(|seconds| after_seconds(now, seconds)),
        }
    }
}
