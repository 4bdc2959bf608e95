//! OAuth2 authorization code flow with PKCE.
//!
//! The crate covers a single provider and a single flow shape: the bot hands
//! the user an authorization URL, the provider redirects back with a code, and
//! the code is exchanged for a credential stored against the user.
//! [`TokenExchangeCoordinator`] drives both halves and keeps credentials fresh
//! with the refresh grant.

mod config;
mod coordinator;
mod error;
mod pkce;
mod types;

pub use config::OAuth2ProviderConfig;
pub use coordinator::TokenExchangeCoordinator;
pub use error::{OAuth2Error, OAuth2Result};
pub use pkce::{CODE_CHALLENGE_METHOD, PkceChallenge, code_challenge, random_hex};
pub use types::{AuthorizationResponse, TokenResponse};
