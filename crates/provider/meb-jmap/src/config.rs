//! JMAP client configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JmapConfig {
    /// Session resource, e.g. `https://api.fastmail.com/jmap/session`.
    pub session_url: String,
    /// Fallback API endpoint used when the session omits `apiUrl`.
    pub api_url: String,
    /// Capability whose primary account receives the method calls.
    pub capability: String,
    pub http_timeout_seconds: u64,
}

impl Default for JmapConfig {
    fn default() -> Self {
        Self {
            session_url: "https://api.fastmail.com/jmap/session".to_string(),
            api_url: "https://api.fastmail.com/jmap/api/".to_string(),
            capability: crate::MASKED_EMAIL_CAPABILITY.to_string(),
            http_timeout_seconds: 30,
        }
    }
}

impl JmapConfig {
    pub fn with_endpoints(session_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            session_url: session_url.into(),
            api_url: api_url.into(),
            ..Self::default()
        }
    }
}
