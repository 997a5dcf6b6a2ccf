//! Notification wire types.

use crate::social::types::{epoch_ts, ServiceError, ServiceResult};
use crate::social::user::models::UserBrief;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `notifications` table, with the sender embedded on reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRow {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub title: String,
    /// Opaque JSON payload, parsed on tap. See [`NotificationPayload`].
    #[serde(default)]
    pub data: String,
    #[serde(default = "epoch_ts")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sender: Option<UserBrief>,
}

/// Insert shape for a new notification.
#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub sender_id: String,
    pub receiver_id: String,
    pub title: String,
    pub data: String,
}

/// The JSON embedded in a notification's text field. Tapping a notification
/// navigates to the post (and highlights the comment, when present).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub post_id: i64,
    #[serde(default)]
    pub comment_id: Option<i64>,
}

impl NotificationPayload {
    pub fn new(post_id: i64, comment_id: Option<i64>) -> Self {
        Self {
            post_id,
            comment_id,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse the text payload carried by a notification row.
    pub fn parse(data: &str) -> ServiceResult<Self> {
        serde_json::from_str(data)
            .map_err(|_| ServiceError::new("Couldn't open the notification"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_the_text_field() {
        let payload = NotificationPayload::new(42, Some(7));
        let parsed = NotificationPayload::parse(&payload.encode()).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn missing_comment_id_is_tolerated() {
        let parsed = NotificationPayload::parse(r#"{"post_id": 42}"#).unwrap();
        assert_eq!(parsed.post_id, 42);
        assert_eq!(parsed.comment_id, None);
    }

    #[test]
    fn garbage_payload_is_an_error_not_a_panic() {
        assert!(NotificationPayload::parse("not json").is_err());
        assert!(NotificationPayload::parse(r#"{"comment_id": 7}"#).is_err());
    }
}
