//! Telegram Bot API client for the masked email bot.
//!
//! Provides [`TelegramClient`] for the handful of methods the bot calls, the
//! wire types those methods exchange, and [`CallbackData`], the
//! `action:payload` format carried by inline keyboard buttons.

mod callback;
mod client;
mod error;
mod types;

pub use callback::{CallbackAction, CallbackData, MAX_CALLBACK_DATA_LEN};
pub use client::{DEFAULT_API_BASE_URL, TelegramClient};
pub use error::{TelegramError, TelegramResult};
pub use types::{
    AnswerCallbackQueryRequest, AnswerInlineQueryRequest, CallbackQuery, Chat,
    EditMessageTextRequest, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery,
    InlineQueryResultArticle, InputTextMessageContent, MARKDOWN_V2, Message, MessageEntity,
    MessageTarget, SendMessageRequest, TelegramResponse, Update, User,
};
