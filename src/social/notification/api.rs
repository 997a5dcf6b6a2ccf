//! Notification HTTP API wrappers.

use crate::social::notification::types::{NewNotification, NotificationRow};
use crate::social::types::handle_rest_response;
use anyhow::{Context, Result};
use tracing::{debug, info};

pub struct NotificationApi {
    client: reqwest::Client,
    base_url: String,
}

impl NotificationApi {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Insert a notification row, returning the stored representation.
    pub async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<NotificationRow> {
        let url = format!("{}/rest/v1/notifications", self.base_url);
        info!(
            "[NotifAPI] creating notification: {} -> {}",
            notification.sender_id, notification.receiver_id
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/vnd.pgrst.object+json")
            .header("Prefer", "return=representation")
            .json(notification)
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<NotificationRow>(response, "create notification").await
    }

    /// All notifications addressed to a user, newest first, with the sender
    /// embedded.
    pub async fn fetch_notifications(&self, receiver_id: &str) -> Result<Vec<NotificationRow>> {
        let url = format!("{}/rest/v1/notifications", self.base_url);
        debug!("[NotifAPI] fetching notifications for {}", receiver_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("select", "*,sender:users(id,name,image)".to_string()),
                ("receiver_id", format!("eq.{}", receiver_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<Vec<NotificationRow>>(response, "fetch notifications").await
    }
}
