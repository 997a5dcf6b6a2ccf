//! Posts: feed pagination + realtime merge, post details with live
//! comments, likes, and the composer.

pub mod api;
pub mod composer;
pub mod detail;
pub mod feed;
pub mod listener;
pub mod service;
pub mod types;

pub use api::PostApi;
pub use composer::{ComposerPhase, PostComposer};
pub use detail::PostDetailStore;
pub use feed::{FeedStore, PAGE_STEP};
pub use listener::{EmptyFeedListener, FeedListener};
pub use service::{PostDraft, PostService};
pub use types::{CommentRow, FeedPost, NewComment, PostDetail, PostLikeRow, PostRow};
