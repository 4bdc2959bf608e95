//! Delivers authorization notices to the user's private chat.

use crate::messages::Messages;
use async_trait::async_trait;
use meb_core::{Error, Notice, Notifier, Result, User};
use meb_telegram::{MARKDOWN_V2, SendMessageRequest, TelegramClient};
use std::sync::Arc;
use tracing::error;

pub struct TelegramNotifier {
    client: TelegramClient,
    messages: Arc<Messages>,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, messages: Arc<Messages>) -> Self {
        Self { client, messages }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user: &User, notice: Notice) -> Result<()> {
        let catalogue = self.messages.for_language(&user.language_code);
        let text = match notice {
            Notice::AuthorizationComplete => &catalogue.authorization_complete,
            Notice::AuthorizationFailed => &catalogue.authorization_failed,
        };

        // Private chats share the user's id.
        let request = SendMessageRequest {
            chat_id: user.id,
            text: text.clone(),
            parse_mode: Some(MARKDOWN_V2.to_string()),
            ..Default::default()
        };

        self.client.send_message(&request).await.map_err(|e| {
            error!(user_id = user.id, ?notice, "Error while sending a notice: {}", e);
            Error::NotifyInternal(e.to_string())
        })?;

        Ok(())
    }
}
