//! User profiles: fetching and editing rows of the `users` table.

pub mod api;
pub mod models;
pub mod service;

pub use api::UserApi;
pub use models::{ProfileUpdate, UserBrief, UserRow};
pub use service::UserService;
