//! Telegram client errors.

use thiserror::Error;

pub type TelegramResult<T> = Result<T, TelegramError>;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Telegram API error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },

    #[error("Missing result in {0} response")]
    MissingResult(&'static str),

    #[error("Invalid callback data: {0:?}")]
    InvalidCallbackData(String),
}
