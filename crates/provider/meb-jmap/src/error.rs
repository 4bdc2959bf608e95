//! JMAP client errors and their classification.

use crate::types::{MethodError, SetError};
use meb_core::ProviderErrorKind;
use thiserror::Error;
use tracing::warn;

pub type JmapResult<T> = Result<T, JmapError>;

#[derive(Debug, Error)]
pub enum JmapError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Capability not available: {0}")]
    CapabilityNotFound(String),

    #[error("Method error: {0}")]
    Method(MethodError),

    #[error("Set rejected: {0}")]
    SetRejected(SetError),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl JmapError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            JmapError::Status { status: 401, .. } => ProviderErrorKind::AuthExpired,
            JmapError::Status { status: 429, .. } => ProviderErrorKind::RateLimited,
            JmapError::Method(error) => classify_method_error(&error.error_type),
            JmapError::SetRejected(error) => classify_set_error(&error.error_type),
            JmapError::InvalidTarget(_) => ProviderErrorKind::InvalidArgument,
            _ => ProviderErrorKind::Internal,
        }
    }
}

fn classify_method_error(error_type: &str) -> ProviderErrorKind {
    match error_type {
        "invalidArguments" | "invalidResultReference" => ProviderErrorKind::InvalidArgument,
        "forbidden" | "accountNotFound" => ProviderErrorKind::AuthExpired,
        _ => ProviderErrorKind::Internal,
    }
}

fn classify_set_error(error_type: &str) -> ProviderErrorKind {
    match error_type {
        "rateLimit" => ProviderErrorKind::RateLimited,
        "invalidProperties" | "invalidPatch" | "notFound" => ProviderErrorKind::InvalidArgument,
        _ => ProviderErrorKind::Internal,
    }
}

impl From<JmapError> for meb_core::Error {
    fn from(err: JmapError) -> Self {
        match err {
            JmapError::CapabilityNotFound(capability) => {
                warn!(%capability, "Account lacks the masked email capability");
                meb_core::Error::ProviderCapabilityNotFound
            }
            other => {
                let kind = other.kind();
                warn!(%kind, "Provider call failed: {}", other);
                meb_core::Error::provider(kind, other.to_string())
            }
        }
    }
}
