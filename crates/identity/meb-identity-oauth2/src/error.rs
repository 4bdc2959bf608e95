//! OAuth2 error types.

use meb_core::ProviderErrorKind;
use thiserror::Error;

pub type OAuth2Result<T> = Result<T, OAuth2Error>;

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Token exchange failed with status {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),
}

impl OAuth2Error {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            OAuth2Error::TokenExchangeFailed { status: 429, .. } => ProviderErrorKind::RateLimited,
            OAuth2Error::RefreshFailed(_) => ProviderErrorKind::AuthExpired,
            _ => ProviderErrorKind::Internal,
        }
    }
}

impl From<OAuth2Error> for meb_core::Error {
    fn from(err: OAuth2Error) -> Self {
        meb_core::Error::provider(err.kind(), err.to_string())
    }
}
