//! Telegram long-polling loop and update handlers.
//!
//! Each update is handled on its own task so a slow provider call never holds
//! up the next `getUpdates`. Handler failures are logged and otherwise
//! dropped; the user always gets a localized reply when we can send one.

use crate::messages::{Catalogue, Messages, escape_code};
use crate::service::MaskedEmailService;
use meb_core::Error;
use meb_telegram::{
    AnswerCallbackQueryRequest, AnswerInlineQueryRequest, CallbackAction, CallbackData,
    CallbackQuery, EditMessageTextRequest, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery,
    InlineQueryResultArticle, MARKDOWN_V2, Message, MessageTarget, SendMessageRequest,
    TelegramClient, TelegramResult, Update, User,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Domain shown in inline query previews.
const PREVIEW_DOMAIN: &str = "example.com";

#[derive(Clone)]
pub struct TelegramBot {
    client: TelegramClient,
    service: MaskedEmailService,
    messages: Arc<Messages>,
    poll_timeout_seconds: u64,
}

impl TelegramBot {
    pub fn new(
        client: TelegramClient,
        service: MaskedEmailService,
        messages: Arc<Messages>,
        poll_timeout_seconds: u64,
    ) -> Self {
        Self {
            client,
            service,
            messages,
            poll_timeout_seconds,
        }
    }

    /// Poll for updates until `shutdown` fires, then wait for in-flight handlers.
    pub async fn run(self, shutdown: CancellationToken) {
        let tracker = TaskTracker::new();
        let mut offset = None;
        let mut backoff = INITIAL_BACKOFF;

        info!("Telegram polling started");

        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.client.get_updates(offset, self.poll_timeout_seconds) => result,
            };

            match result {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        let bot = self.clone();
                        tracker.spawn(async move { bot.handle_update(update).await });
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch updates, retrying in {:?}: {}", backoff, e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        tracker.close();
        tracker.wait().await;
        info!("Telegram polling stopped");
    }

    #[instrument(skip_all, fields(update_id = update.update_id))]
    async fn handle_update(&self, update: Update) {
        let result = if let Some(message) = update.message {
            self.handle_message(message).await
        } else if let Some(query) = update.callback_query {
            self.handle_callback(query).await
        } else if let Some(query) = update.inline_query {
            self.handle_inline_query(query).await
        } else {
            debug!("Ignoring unsupported update");
            Ok(())
        };

        if let Err(e) = result {
            error!("Error while handling update: {}", e);
        }
    }

    async fn handle_message(&self, message: Message) -> TelegramResult<()> {
        let Some(from) = message.from.clone() else {
            return Ok(());
        };
        let catalogue = self.catalogue(&from);

        match message.command() {
            Some("start") => self.start_command(&message, &from, catalogue).await,
            Some(command) => {
                debug!(command, "Unknown command");
                self.send_plain(&message, &catalogue.unknown_command).await
            }
            None => match message.text.as_deref() {
                Some(text) if !text.trim().is_empty() => {
                    self.link(&message, &from, text.trim(), catalogue).await
                }
                _ => Ok(()),
            },
        }
    }

    async fn start_command(&self, message: &Message, from: &User, catalogue: &Catalogue) -> TelegramResult<()> {
        let language_code = from.language_code.as_deref().unwrap_or_default();
        let url = match self.service.start_flow(from.id, language_code).await {
            Ok(url) => url,
            Err(_) => return self.send_plain(message, &catalogue.error).await,
        };

        self.client
            .send_message(&SendMessageRequest {
                chat_id: message.chat.id,
                text: catalogue.start.clone(),
                parse_mode: Some(MARKDOWN_V2.to_string()),
                reply_markup: Some(InlineKeyboardMarkup::single(InlineKeyboardButton::url(
                    &catalogue.start_button,
                    url,
                ))),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    /// Create a masked email for the link in `text`.
    async fn link(&self, message: &Message, from: &User, text: &str, catalogue: &Catalogue) -> TelegramResult<()> {
        let alias = match self.service.create_alias(from.id, text).await {
            Ok(alias) => alias,
            Err(e) => return self.send_plain(message, failure_text(&e, catalogue)).await,
        };

        let reply_markup = match CallbackData::enable(&alias.id).to_button_data() {
            Some(data) => Some(InlineKeyboardMarkup::single(InlineKeyboardButton::callback(
                &catalogue.email_keep_button,
                data,
            ))),
            None => {
                warn!(alias_id = %alias.id, "Alias id too long for a callback button");
                None
            }
        };

        self.client
            .send_message(&SendMessageRequest {
                chat_id: message.chat.id,
                text: catalogue.email(&alias.email),
                parse_mode: Some(MARKDOWN_V2.to_string()),
                reply_to_message_id: Some(message.message_id),
                reply_markup,
            })
            .await?;
        Ok(())
    }

    async fn handle_callback(&self, query: CallbackQuery) -> TelegramResult<()> {
        let catalogue = self.catalogue(&query.from);

        let data = match query.data.as_deref().map(str::parse::<CallbackData>) {
            Some(Ok(data)) => data,
            Some(Err(e)) => {
                warn!("Ignoring callback: {}", e);
                return self.answer_callback(&query, &catalogue.error, true).await;
            }
            None => return self.answer_callback(&query, "", false).await,
        };

        match data.action {
            CallbackAction::Enable => self.enable(&query, &data.payload, catalogue).await,
            CallbackAction::Prefix => self.prefix(&query, &data.payload, catalogue).await,
        }
    }

    /// Keep the masked email and drop the disclaimer from its message.
    async fn enable(&self, query: &CallbackQuery, alias_id: &str, catalogue: &Catalogue) -> TelegramResult<()> {
        if let Err(e) = self.service.enable_alias(query.from.id, alias_id).await {
            return self
                .answer_callback(query, failure_text(&e, catalogue), true)
                .await;
        }

        self.answer_callback(query, &catalogue.email_activated, false)
            .await?;

        // The address is the first entity of the message we sent.
        let Some(message) = &query.message else {
            return Ok(());
        };
        let Some(email) = message
            .entities
            .first()
            .and_then(|entity| message.entity_text(entity))
        else {
            warn!(message_id = message.message_id, "No address found in the alias message");
            return Ok(());
        };

        let mut edit = EditMessageTextRequest::new(
            MessageTarget::Chat {
                chat_id: message.chat.id,
                message_id: message.message_id,
            },
            catalogue.email_without_disclaimer(&email),
        );
        edit.parse_mode = Some(MARKDOWN_V2.to_string());
        self.client.edit_message_text(&edit).await
    }

    /// Create a masked email from an inline query result's button.
    async fn prefix(&self, query: &CallbackQuery, prefix: &str, catalogue: &Catalogue) -> TelegramResult<()> {
        let alias = match self.service.create_alias_with_prefix(query.from.id, prefix).await {
            Ok(alias) => alias,
            Err(e) => {
                return self
                    .answer_callback(query, failure_text(&e, catalogue), true)
                    .await;
            }
        };

        self.answer_callback(query, &catalogue.inline_generated, false)
            .await?;

        let target = match (&query.inline_message_id, &query.message) {
            (Some(inline_message_id), _) => MessageTarget::Inline {
                inline_message_id: inline_message_id.clone(),
            },
            (None, Some(message)) => MessageTarget::Chat {
                chat_id: message.chat.id,
                message_id: message.message_id,
            },
            (None, None) => return Ok(()),
        };

        let mut edit = EditMessageTextRequest::new(target, format!("`{}`", escape_code(&alias.email)));
        edit.parse_mode = Some(MARKDOWN_V2.to_string());
        self.client.edit_message_text(&edit).await
    }

    /// Offer a preview of the masked email a prefix would produce.
    async fn handle_inline_query(&self, query: InlineQuery) -> TelegramResult<()> {
        let catalogue = self.catalogue(&query.from);
        let prefix = query.query.as_str();

        let button_data = if is_valid_prefix(prefix) {
            CallbackData::prefix(prefix).to_button_data()
        } else {
            None
        };

        let results = match button_data {
            Some(data) => {
                let example = format!("{prefix}.xxxxx@{PREVIEW_DOMAIN}");
                let mut article =
                    InlineQueryResultArticle::new(&query.id, &example, format!("`{}`", escape_code(&example)));
                article.input_message_content.parse_mode = Some(MARKDOWN_V2.to_string());
                article.reply_markup = Some(InlineKeyboardMarkup::single(InlineKeyboardButton::callback(
                    &catalogue.inline_generate_button,
                    data,
                )));
                vec![article]
            }
            None => Vec::new(),
        };

        self.client
            .answer_inline_query(&AnswerInlineQueryRequest {
                inline_query_id: query.id.clone(),
                results,
                cache_time: Some(0),
                is_personal: true,
            })
            .await
    }

    fn catalogue(&self, user: &User) -> &Catalogue {
        self.messages
            .for_language(user.language_code.as_deref().unwrap_or_default())
    }

    async fn send_plain(&self, message: &Message, text: &str) -> TelegramResult<()> {
        self.client
            .send_message(&SendMessageRequest {
                chat_id: message.chat.id,
                text: text.to_string(),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, query: &CallbackQuery, text: &str, show_alert: bool) -> TelegramResult<()> {
        self.client
            .answer_callback_query(&AnswerCallbackQueryRequest {
                callback_query_id: query.id.clone(),
                text: Some(text.to_string()).filter(|t| !t.is_empty()),
                show_alert,
            })
            .await
    }
}

/// Prefixes accepted from inline queries: `^[a-z0-9_]+$`.
fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn failure_text<'a>(err: &Error, catalogue: &'a Catalogue) -> &'a str {
    if err.requires_authorization() {
        &catalogue.authorize_first
    } else {
        &catalogue.error
    }
}
