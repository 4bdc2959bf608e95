//! Telegram Bot API types.
//!
//! Only the fields the bot reads or writes are modelled; unknown fields in
//! responses are ignored.

use serde::{Deserialize, Serialize};

/// Parse mode used for every formatted message the bot sends.
pub const MARKDOWN_V2: &str = "MarkdownV2";

/// Wrapper for all Telegram Bot API responses.
///
/// Every API method returns `{ ok: bool, result?: T, description?: String }`.
/// When `ok` is `false`, `description` contains the error message.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

/// A single update from the `getUpdates` long-polling endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonically increasing update identifier.
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
    pub inline_query: Option<InlineQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Sender of the message. Absent for messages in channels.
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub date: i64,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

impl Message {
    /// The command name if the message starts with a bot command.
    ///
    /// `/start@my_bot payload` yields `start`.
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?;
        let is_command = self
            .entities
            .iter()
            .any(|entity| entity.entity_type == "bot_command" && entity.offset == 0);
        if !is_command && !text.starts_with('/') {
            return None;
        }

        let token = text.split_whitespace().next()?.strip_prefix('/')?;
        Some(token.split('@').next().unwrap_or(token))
    }

    /// The text covered by `entity`.
    ///
    /// Entity offsets count UTF-16 code units, not bytes or chars.
    pub fn entity_text(&self, entity: &MessageEntity) -> Option<String> {
        let text = self.text.as_deref()?;
        let start = usize::try_from(entity.offset).ok()?;
        let len = usize::try_from(entity.length).ok()?;

        let units: Vec<u16> = text.encode_utf16().collect();
        let slice = units.get(start..start.checked_add(len)?)?;
        String::from_utf16(slice).ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub offset: i64,
    pub length: i64,
}

/// A Telegram user or bot.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    /// Without the leading `@`.
    pub username: Option<String>,
    /// IETF language tag of the user's client, if known.
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// `"private"`, `"group"`, `"supergroup"`, or `"channel"`.
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// Present when the button was attached to a chat message.
    pub message: Option<Message>,
    /// Present when the button was attached to an inline-mode message.
    pub inline_message_id: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// A keyboard with a single button.
    pub fn single(button: InlineKeyboardButton) -> Self {
        Self {
            inline_keyboard: vec![vec![button]],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            callback_data: None,
        }
    }

    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: Some(data.into()),
        }
    }
}

/// Where a message to edit lives.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageTarget {
    Chat { chat_id: i64, message_id: i64 },
    Inline { inline_message_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditMessageTextRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl EditMessageTextRequest {
    pub fn new(target: MessageTarget, text: impl Into<String>) -> Self {
        let mut request = Self {
            text: text.into(),
            ..Default::default()
        };
        match target {
            MessageTarget::Chat {
                chat_id,
                message_id,
            } => {
                request.chat_id = Some(chat_id);
                request.message_id = Some(message_id);
            }
            MessageTarget::Inline { inline_message_id } => {
                request.inline_message_id = Some(inline_message_id);
            }
        }
        request
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnswerCallbackQueryRequest {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub show_alert: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerInlineQueryRequest {
    pub inline_query_id: String,
    pub results: Vec<InlineQueryResultArticle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<u32>,
    pub is_personal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineQueryResultArticle {
    /// Always `"article"`.
    #[serde(rename = "type")]
    pub result_type: String,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_message_content: InputTextMessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl InlineQueryResultArticle {
    pub fn new(id: impl Into<String>, title: impl Into<String>, message_text: impl Into<String>) -> Self {
        Self {
            result_type: "article".to_string(),
            id: id.into(),
            title: title.into(),
            description: None,
            input_message_content: InputTextMessageContent {
                message_text: message_text.into(),
                parse_mode: None,
            },
            reply_markup: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputTextMessageContent {
    pub message_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
}
