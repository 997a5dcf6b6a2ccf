pub mod social;

// Re-export the types most callers need.
pub use social::{
    auth::{AuthEvent, AuthListener, Session, SessionStore},
    client::{ChangeHandler, ChannelHandle, ClientConfig, LinkieClient},
    notification::{BadgeStore, NotificationListener, NotificationPayload, NotificationService},
    post::{FeedListener, FeedStore, PostComposer, PostDetailStore, PostService},
    storage::{MediaKind, MediaSource, StorageService},
    types::{ChangeEvent, ChangeKind, ChannelSpec, EventFilter, ServiceError, ServiceResult},
    user::{UserRow, UserService},
};
