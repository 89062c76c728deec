use async_trait::async_trait;

/// A subscriber is a Telegram chat; the id doubles as the delivery address.
pub type SubscriberId = i64;

/// Outbound alert delivery.
///
/// Fire-and-forget: implementations log delivery failures and return, so a
/// broken sink can never stop a monitoring session.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, subscriber: SubscriberId, text: &str);
}
