//! Linkie client core: auth, profiles, the home feed, post details and
//! in-app notifications, all backed by one hosted backend and its
//! realtime change feed.

pub mod auth;
pub mod client;
pub mod notification;
pub mod post;
pub mod storage;
pub mod types;
pub mod user;
