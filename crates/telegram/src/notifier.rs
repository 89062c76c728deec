use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::warn;

use common::{NotificationSink, SubscriberId};

/// Delivers alerts to the subscriber's chat.
///
/// Delivery is fire-and-forget: a failed send is logged and dropped so a
/// Telegram outage can never stall a monitoring session.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            bot: Bot::new(token.into()),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify(&self, subscriber: SubscriberId, text: &str) {
        if let Err(e) = self.bot.send_message(ChatId(subscriber), text).await {
            warn!(chat_id = subscriber, error = %e, "Failed to send Telegram alert");
        }
    }
}
