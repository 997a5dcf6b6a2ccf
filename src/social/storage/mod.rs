//! Object storage: media upload, download and public URL derivation.

pub mod api;
pub mod models;
pub mod service;

pub use api::StorageApi;
pub use models::{AvatarSource, MediaKind, MediaSource};
pub use service::StorageService;
