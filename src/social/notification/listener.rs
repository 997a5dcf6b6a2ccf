//! Notification callbacks.

use async_trait::async_trait;

#[async_trait]
pub trait NotificationListener: Send + Sync {
    /// A notification for the signed-in user arrived over the change feed;
    /// payload is the pushed row JSON.
    async fn on_new_notification(&self, notification_json: String);

    /// The unseen-notification badge count changed (increment or reset).
    async fn on_badge_changed(&self, count: i32);
}

/// Default no-op listener.
pub struct EmptyNotificationListener;

#[async_trait]
impl NotificationListener for EmptyNotificationListener {
    async fn on_new_notification(&self, _notification_json: String) {}
    async fn on_badge_changed(&self, _count: i32) {}
}
