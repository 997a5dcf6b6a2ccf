//! Feed callbacks.

use async_trait::async_trait;

/// Feed store callbacks. List payloads are JSON arrays of feed entries,
/// sorted the way the view renders them.
#[async_trait]
pub trait FeedListener: Send + Sync {
    /// The derived feed view changed (pagination merge, pushed insert or
    /// update, like toggle).
    async fn on_feed_changed(&self, posts_json: String);

    /// A post was removed from the feed.
    async fn on_post_removed(&self, post_id: i64);

    /// The "more posts available" flag flipped.
    async fn on_has_more_changed(&self, has_more: bool);
}

/// Default no-op listener.
pub struct EmptyFeedListener;

#[async_trait]
impl FeedListener for EmptyFeedListener {
    async fn on_feed_changed(&self, _posts_json: String) {}
    async fn on_post_removed(&self, _post_id: i64) {}
    async fn on_has_more_changed(&self, _has_more: bool) {}
}
