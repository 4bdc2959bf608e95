//! Inline keyboard callback payloads.
//!
//! Buttons carry `action:payload`. Only the first colon separates the two, so
//! payloads may contain colons themselves.

use crate::error::TelegramError;
use std::fmt;
use std::str::FromStr;

/// Upper bound Telegram puts on `callback_data`, in bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Enable the masked email whose id is the payload.
    Enable,
    /// Create a masked email with the payload as prefix.
    Prefix,
}

impl CallbackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CallbackAction::Enable => "id",
            CallbackAction::Prefix => "prefix",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackData {
    pub action: CallbackAction,
    pub payload: String,
}

impl CallbackData {
    pub fn enable(alias_id: impl Into<String>) -> Self {
        Self {
            action: CallbackAction::Enable,
            payload: alias_id.into(),
        }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            action: CallbackAction::Prefix,
            payload: prefix.into(),
        }
    }

    /// The encoded form, or `None` if Telegram would reject it as too long.
    pub fn to_button_data(&self) -> Option<String> {
        Some(self.to_string()).filter(|data| data.len() <= MAX_CALLBACK_DATA_LEN)
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action.as_str(), self.payload)
    }
}

impl FromStr for CallbackData {
    type Err = TelegramError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let (action, payload) = data
            .split_once(':')
            .ok_or_else(|| TelegramError::InvalidCallbackData(data.to_string()))?;

        let action = match action {
            "id" => CallbackAction::Enable,
            "prefix" => CallbackAction::Prefix,
            _ => return Err(TelegramError::InvalidCallbackData(data.to_string())),
        };

        Ok(Self {
            action,
            payload: payload.to_string(),
        })
    }
}
