//! JMAP client for the masked email capability.
//!
//! Only the calls the bot needs are implemented: session discovery to find the
//! account bound to the masked email capability, and `MaskedEmail/set` to
//! create an address or move it from `pending` to `enabled`.

mod client;
mod config;
mod error;
mod prefix;
mod types;

pub use client::{JmapClient, SessionInfo};
pub use config::JmapConfig;
pub use error::{JmapError, JmapResult};
pub use prefix::{TargetPrefix, email_prefix_for};
pub use types::{
    Invocation, MaskedEmail, MaskedEmailSet, MaskedEmailSetResponse, MethodError, Request,
    Response, SessionResource, SetError,
};

/// Capability URN of the masked email extension.
pub const MASKED_EMAIL_CAPABILITY: &str = "https://www.fastmail.com/dev/maskedemail";
