//! Notification service and the home-screen badge store.

use crate::social::notification::api::NotificationApi;
use crate::social::notification::listener::{EmptyNotificationListener, NotificationListener};
use crate::social::notification::types::{NewNotification, NotificationRow};
use crate::social::types::{ChangeEvent, ChangeKind, ServiceError, ServiceResult};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

#[derive(Clone)]
pub struct NotificationService {
    api: Arc<NotificationApi>,
}

impl NotificationService {
    pub fn new(api: Arc<NotificationApi>) -> Self {
        Self { api }
    }

    pub async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> ServiceResult<NotificationRow> {
        match self.api.create_notification(&notification).await {
            Ok(row) => Ok(row),
            Err(e) => {
                error!("[Notif] notification error: {:?}", e);
                Err(ServiceError::new("Something went wrong!"))
            }
        }
    }

    pub async fn fetch_notifications(
        &self,
        receiver_id: &str,
    ) -> ServiceResult<Vec<NotificationRow>> {
        match self.api.fetch_notifications(receiver_id).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                error!("[Notif] fetch notifications error: {:?}", e);
                Err(ServiceError::new("Couldn't fetch notifications"))
            }
        }
    }
}

/// Counts notification inserts pushed over the change feed while the user is
/// elsewhere in the app; reset when the notifications screen opens.
pub struct BadgeStore {
    count: AtomicI32,
    listener: RwLock<Arc<dyn NotificationListener>>,
}

impl BadgeStore {
    pub fn new() -> Self {
        Self {
            count: AtomicI32::new(0),
            listener: RwLock::new(Arc::new(EmptyNotificationListener)),
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn NotificationListener>) {
        *self.listener.write().expect("badge listener lock") = listener;
    }

    pub fn count(&self) -> i32 {
        self.count.load(Ordering::SeqCst)
    }

    fn listener(&self) -> Arc<dyn NotificationListener> {
        self.listener.read().expect("badge listener lock").clone()
    }

    /// Merge one pushed event. Only inserts carrying a row id count.
    pub async fn apply_event(&self, event: &ChangeEvent) {
        if event.kind != ChangeKind::Insert {
            return;
        }
        let Some(row) = event.new.as_ref() else {
            return;
        };
        if row.get("id").is_none() {
            return;
        }

        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("[Badge] notification badge: {}", count);
        let json = serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string());
        let listener = self.listener();
        listener.on_new_notification(json).await;
        listener.on_badge_changed(count).await;
    }

    /// Clear the badge (the user opened the notifications screen).
    pub async fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        self.listener().on_badge_changed(0).await;
    }
}

impl Default for BadgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl crate::social::client::ChangeHandler for BadgeStore {
    async fn on_change(&self, event: ChangeEvent) {
        self.apply_event(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert_event(id: i64) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Insert,
            schema: "public".to_string(),
            table: "notifications".to_string(),
            new: Some(json!({"id": id, "receiver_id": "u-1"})),
            old: None,
        }
    }

    #[tokio::test]
    async fn badge_counts_inserts_and_resets() {
        let store = BadgeStore::new();
        store.apply_event(&insert_event(1)).await;
        store.apply_event(&insert_event(2)).await;
        assert_eq!(store.count(), 2);

        store.reset().await;
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn non_insert_events_are_ignored() {
        let store = BadgeStore::new();
        let mut event = insert_event(1);
        event.kind = ChangeKind::Delete;
        event.old = event.new.take();
        store.apply_event(&event).await;
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn inserts_without_an_id_are_ignored() {
        let store = BadgeStore::new();
        let mut event = insert_event(1);
        event.new = Some(json!({"receiver_id": "u-1"}));
        store.apply_event(&event).await;
        assert_eq!(store.count(), 0);
    }
}
