//! In-app notifications: rows, delivery badge and payload parsing.

pub mod api;
pub mod listener;
pub mod service;
pub mod types;

pub use api::NotificationApi;
pub use listener::{EmptyNotificationListener, NotificationListener};
pub use service::{BadgeStore, NotificationService};
pub use types::{NewNotification, NotificationPayload, NotificationRow};
