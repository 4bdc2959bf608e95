//! HTTP client wrapper for the Telegram Bot API.
//!
//! [`TelegramClient`] provides typed methods for the subset of the Bot API the
//! bot uses. Every method is a JSON `POST` to `{base_url}/{method}`.

use crate::error::{TelegramError, TelegramResult};
use crate::types::{
    AnswerCallbackQueryRequest, AnswerInlineQueryRequest, EditMessageTextRequest,
    GetUpdatesRequest, Message, SendMessageRequest, TelegramResponse, Update, User,
};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Extra time granted on top of the long-poll timeout before giving up.
const POLL_GRACE_SECONDS: u64 = 10;

/// Update kinds the bot subscribes to.
const ALLOWED_UPDATES: &[&str] = &["message", "callback_query", "inline_query"];

/// HTTP client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    /// `{api_base_url}/bot{token}`; never logged.
    base_url: String,
    /// Log request and response payloads.
    debug: bool,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_api_base_url(DEFAULT_API_BASE_URL, token)
    }

    /// Client for a Bot API server other than the public one.
    pub fn with_api_base_url(api_base_url: &str, token: &str) -> Self {
        let base_url = format!("{}/bot{}", api_base_url.trim_end_matches('/'), token);
        Self::with_base_url(base_url)
    }

    /// Client for a fully formed base URL, method names are appended to it.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Verify the bot token.
    pub async fn get_me(&self) -> TelegramResult<User> {
        debug!("verifying bot token");
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Fetch new updates using long polling.
    ///
    /// `offset` is the id of the first update to return; `timeout` is the
    /// long-poll timeout in seconds.
    pub async fn get_updates(&self, offset: Option<i64>, timeout: u64) -> TelegramResult<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: ALLOWED_UPDATES.iter().map(|s| s.to_string()).collect(),
        };

        trace!(?offset, "polling for updates");
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &request,
                Some(Duration::from_secs(timeout + POLL_GRACE_SECONDS)),
            )
            .await?;

        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }
        Ok(updates)
    }

    pub async fn send_message(&self, request: &SendMessageRequest) -> TelegramResult<Message> {
        debug!(chat_id = request.chat_id, "sending message");
        self.call("sendMessage", request, None).await
    }

    /// Edit a chat or inline message.
    ///
    /// Telegram answers with the message for chat messages and with `true` for
    /// inline ones; neither is needed, so the result is discarded.
    pub async fn edit_message_text(&self, request: &EditMessageTextRequest) -> TelegramResult<()> {
        let _: serde_json::Value = self.call("editMessageText", request, None).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, request: &AnswerCallbackQueryRequest) -> TelegramResult<()> {
        let _: bool = self.call("answerCallbackQuery", request, None).await?;
        Ok(())
    }

    pub async fn answer_inline_query(&self, request: &AnswerInlineQueryRequest) -> TelegramResult<()> {
        let _: bool = self.call("answerInlineQuery", request, None).await?;
        Ok(())
    }

    async fn call<Req, Res>(
        &self,
        method: &'static str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> TelegramResult<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        if self.debug {
            debug!(method, request = %serde_json::to_string(request).unwrap_or_default(), "telegram request");
        }

        let mut builder = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        // Telegram reports failures in the body with a non-2xx status, so the
        // body is decoded regardless of the status code.
        let response = builder.send().await?;
        let body: TelegramResponse<Res> = response.json().await?;

        if !body.ok {
            let description = body.description.unwrap_or_else(|| "unknown error".into());
            warn!(method, code = ?body.error_code, "Telegram API error: {}", description);
            return Err(TelegramError::Api {
                code: body.error_code,
                description,
            });
        }

        body.result.ok_or(TelegramError::MissingResult(method))
    }
}
