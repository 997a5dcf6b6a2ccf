//! The home feed: widening-limit pagination reconciled with pushed
//! insert/update/delete events.
//!
//! State is a single map keyed by post id; the list view is derived on
//! read, sorted newest first. Keying by id is what makes an overlapping
//! page fetch and a pushed insert converge instead of duplicating or
//! dropping an entry.

use crate::social::client::ChangeHandler;
use crate::social::post::listener::{EmptyFeedListener, FeedListener};
use crate::social::post::service::PostService;
use crate::social::post::types::{FeedPost, PostLikeRow, PostRow};
use crate::social::types::{ChangeEvent, ChangeKind, ServiceError, ServiceResult};
use crate::social::user::models::UserBrief;
use crate::social::user::UserService;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// How much the fetch limit widens per "load more".
pub const PAGE_STEP: u32 = 10;

struct FeedState {
    posts: HashMap<i64, FeedPost>,
    /// Single widening fetch limit; there is no cursor or offset.
    limit: u32,
    has_more: bool,
}

pub struct FeedStore {
    posts: PostService,
    users: UserService,
    listener: RwLock<Arc<dyn FeedListener>>,
    state: Mutex<FeedState>,
}

impl FeedStore {
    pub fn new(posts: PostService, users: UserService) -> Self {
        Self {
            posts,
            users,
            listener: RwLock::new(Arc::new(EmptyFeedListener)),
            state: Mutex::new(FeedState {
                posts: HashMap::new(),
                limit: 0,
                has_more: true,
            }),
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn FeedListener>) {
        *self.listener.write().expect("feed listener lock") = listener;
    }

    fn listener(&self) -> Arc<dyn FeedListener> {
        self.listener.read().expect("feed listener lock").clone()
    }

    /// The derived list view: newest first, id as tiebreaker.
    pub fn snapshot(&self) -> Vec<FeedPost> {
        let state = self.state.lock().expect("feed state lock");
        let mut list: Vec<FeedPost> = state.posts.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    }

    fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("feed state lock").posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limit(&self) -> u32 {
        self.state.lock().expect("feed state lock").limit
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().expect("feed state lock").has_more
    }

    /// Widen the limit by one step and fetch. A page whose row count equals
    /// the current list length latches `has_more` false and later calls
    /// become no-ops.
    ///
    /// The termination check under-detects "more available" when
    /// concurrent deletions shrink the server-side page to exactly the
    /// local count; the behavior of the shipped client is kept as-is.
    pub async fn load_more(&self) -> ServiceResult<()> {
        let limit = {
            let mut state = self.state.lock().expect("feed state lock");
            if !state.has_more {
                debug!("[Feed] no more posts, skipping fetch");
                return Ok(());
            }
            state.limit += PAGE_STEP;
            state.limit
        };

        info!("[Feed] fetching posts, limit: {}", limit);
        let page = self.posts.fetch_posts(limit).await?;
        let exhausted = self.merge_page(page);

        self.listener().on_feed_changed(self.snapshot_json()).await;
        if exhausted {
            self.listener().on_has_more_changed(false).await;
        }
        Ok(())
    }

    /// Pull-to-refresh runs the same widening fetch as "load more": one
    /// more step on the limit, same exhaustion latch.
    pub async fn refresh(&self) -> ServiceResult<()> {
        self.load_more().await
    }

    /// Reconcile one fetched page into the map. Returns whether the page
    /// exhausted the feed (row count equal to the pre-merge list length).
    fn merge_page(&self, page: Vec<FeedPost>) -> bool {
        let mut state = self.state.lock().expect("feed state lock");
        let exhausted = page.len() == state.posts.len();
        if exhausted && state.has_more {
            info!("[Feed] page matches local count ({}), feed exhausted", page.len());
            state.has_more = false;
        }
        for post in page {
            state.posts.insert(post.id, post);
        }
        exhausted
    }

    /// Merge one pushed post event, hydrating the author on inserts the way
    /// the fetch embeds would.
    pub async fn apply_event(&self, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::Insert => {
                let Some(row) = event
                    .new
                    .as_ref()
                    .and_then(|v| serde_json::from_value::<PostRow>(v.clone()).ok())
                else {
                    warn!("[Feed] insert event without a usable row, dropping");
                    return;
                };
                // author shape mirrors the `users (id, name, image)` embed;
                // a failed lookup leaves it empty rather than dropping the post
                let author = match self.users.get_user_data(&row.user_id).await {
                    Ok(user) => user.into(),
                    Err(e) => {
                        warn!("[Feed] author lookup failed for {}: {}", row.user_id, e);
                        UserBrief::default()
                    }
                };
                self.apply_insert(row, author);
                self.listener().on_feed_changed(self.snapshot_json()).await;
            }
            ChangeKind::Update => {
                let Some(row) = event
                    .new
                    .as_ref()
                    .and_then(|v| serde_json::from_value::<PostRow>(v.clone()).ok())
                else {
                    return;
                };
                if self.apply_update(row) {
                    self.listener().on_feed_changed(self.snapshot_json()).await;
                }
            }
            ChangeKind::Delete => {
                let Some(post_id) = event
                    .old
                    .as_ref()
                    .and_then(|v| v.get("id"))
                    .and_then(|v| v.as_i64())
                else {
                    return;
                };
                if self.apply_delete(post_id) {
                    let listener = self.listener();
                    listener.on_post_removed(post_id).await;
                    listener.on_feed_changed(self.snapshot_json()).await;
                }
            }
        }
    }

    /// Insert a pushed row. An id already present is treated as an update
    /// so the feed never holds duplicate ids.
    pub fn apply_insert(&self, row: PostRow, author: UserBrief) {
        let mut state = self.state.lock().expect("feed state lock");
        match state.posts.get_mut(&row.id) {
            Some(existing) => {
                existing.body = row.body;
                existing.file = row.file;
            }
            None => {
                debug!("[Feed] new post pushed: {}", row.id);
                state.posts.insert(row.id, FeedPost::from_row(row, author));
            }
        }
    }

    /// Patch `body` and `file` of an existing entry; unknown ids are
    /// ignored. Returns whether anything changed.
    pub fn apply_update(&self, row: PostRow) -> bool {
        let mut state = self.state.lock().expect("feed state lock");
        match state.posts.get_mut(&row.id) {
            Some(existing) => {
                existing.body = row.body;
                existing.file = row.file;
                true
            }
            None => false,
        }
    }

    /// Remove exactly the matching id. Returns whether it was present.
    pub fn apply_delete(&self, post_id: i64) -> bool {
        let mut state = self.state.lock().expect("feed state lock");
        let removed = state.posts.remove(&post_id).is_some();
        if removed {
            debug!("[Feed] post removed: {}", post_id);
        }
        removed
    }

    /// Force local like membership for `(post, user)` to `liked`. Idempotent:
    /// at most one entry exists afterwards, none when unliking. Returns
    /// whether membership changed.
    pub fn set_liked(&self, post_id: i64, user_id: &str, liked: bool) -> bool {
        let mut state = self.state.lock().expect("feed state lock");
        let Some(post) = state.posts.get_mut(&post_id) else {
            return false;
        };
        let currently = post.liked_by(user_id);
        if liked && !currently {
            post.post_likes.push(PostLikeRow::new(post_id, user_id));
            true
        } else if !liked && currently {
            post.post_likes.retain(|l| l.user_id != user_id);
            true
        } else {
            false
        }
    }

    /// Like or unlike a post: optimistic local mutation first, then the
    /// network call. Local state is not rolled back on failure. Returns the
    /// new liked state.
    pub async fn toggle_like(&self, post_id: i64, user_id: &str) -> ServiceResult<bool> {
        let was_liked = {
            let state = self.state.lock().expect("feed state lock");
            match state.posts.get(&post_id) {
                Some(post) => post.liked_by(user_id),
                None => return Err(ServiceError::new("Something went wrong!")),
            }
        };

        self.set_liked(post_id, user_id, !was_liked);
        self.listener().on_feed_changed(self.snapshot_json()).await;

        let result = if was_liked {
            self.posts.remove_post_like(post_id, user_id).await
        } else {
            self.posts
                .create_post_like(PostLikeRow::new(post_id, user_id))
                .await
                .map(|_| ())
        };
        result.map_err(|_| ServiceError::new("Something went wrong!"))?;
        Ok(!was_liked)
    }
}

#[async_trait]
impl ChangeHandler for FeedStore {
    async fn on_change(&self, event: ChangeEvent) {
        self.apply_event(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::post::api::PostApi;
    use crate::social::storage::api::StorageApi;
    use crate::social::storage::StorageService;
    use crate::social::user::api::UserApi;
    use chrono::{DateTime, TimeZone, Utc};

    // services point at a closed port; only the pure merge paths run here
    fn test_store() -> FeedStore {
        let client = reqwest::Client::new();
        let base = "http://localhost:9".to_string();
        let storage = StorageService::new(
            Arc::new(StorageApi::new(client.clone(), base.clone())),
            base.clone(),
        );
        let posts = PostService::new(
            Arc::new(PostApi::new(client.clone(), base.clone())),
            storage.clone(),
        );
        let users = UserService::new(Arc::new(UserApi::new(client, base)), storage);
        FeedStore::new(posts, users)
    }

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn row(id: i64, seconds: i64) -> PostRow {
        PostRow {
            id,
            user_id: "u-1".to_string(),
            body: format!("<p>post {}</p>", id),
            file: None,
            created_at: ts(seconds),
        }
    }

    fn feed_post(id: i64, seconds: i64) -> FeedPost {
        FeedPost::from_row(row(id, seconds), UserBrief::default())
    }

    #[test]
    fn pushed_inserts_never_duplicate_ids() {
        let store = test_store();
        store.apply_insert(row(1, 100), UserBrief::default());
        store.apply_insert(row(2, 200), UserBrief::default());
        // the same insert pushed again (page fetch / channel echo overlap)
        store.apply_insert(row(1, 100), UserBrief::default());

        let view = store.snapshot();
        assert_eq!(view.len(), 2);
        let mut ids: Vec<i64> = view.iter().map(|p| p.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn feed_view_is_sorted_newest_first() {
        let store = test_store();
        store.apply_insert(row(1, 100), UserBrief::default());
        store.apply_insert(row(3, 300), UserBrief::default());
        store.apply_insert(row(2, 200), UserBrief::default());

        let ids: Vec<i64> = store.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn delete_removes_exactly_the_matching_id() {
        let store = test_store();
        store.apply_insert(row(1, 100), UserBrief::default());
        store.apply_insert(row(2, 200), UserBrief::default());
        store.apply_insert(row(3, 300), UserBrief::default());

        assert!(store.apply_delete(2));
        let ids: Vec<i64> = store.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1]);

        // deleting an unknown id changes nothing
        assert!(!store.apply_delete(42));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn update_patches_body_and_file_only_for_known_ids() {
        let store = test_store();
        store.apply_insert(row(1, 100), UserBrief::default());
        store.set_liked(1, "u-2", true);

        let mut updated = row(1, 100);
        updated.body = "<p>edited</p>".to_string();
        updated.file = Some("postImages/1.png".to_string());
        assert!(store.apply_update(updated));

        let post = &store.snapshot()[0];
        assert_eq!(post.body, "<p>edited</p>");
        assert_eq!(post.file.as_deref(), Some("postImages/1.png"));
        // likes survive the patch
        assert!(post.liked_by("u-2"));

        assert!(!store.apply_update(row(9, 900)));
    }

    #[test]
    fn page_equal_to_local_count_latches_has_more_false() {
        let store = test_store();
        assert!(store.has_more());

        // first page: 3 rows against an empty store
        assert!(!store.merge_page(vec![
            feed_post(1, 100),
            feed_post(2, 200),
            feed_post(3, 300),
        ]));
        assert!(store.has_more());

        // widened fetch returns the same 3 rows: exhausted
        assert!(store.merge_page(vec![
            feed_post(1, 100),
            feed_post(2, 200),
            feed_post(3, 300),
        ]));
        assert!(!store.has_more());
    }

    #[tokio::test]
    async fn limit_widens_by_step_even_when_the_fetch_fails() {
        let store = test_store();
        assert_eq!(store.limit(), 0);
        // fetch against a closed port fails; the widened limit stays
        assert!(store.load_more().await.is_err());
        assert_eq!(store.limit(), PAGE_STEP);
        assert!(store.load_more().await.is_err());
        assert_eq!(store.limit(), 2 * PAGE_STEP);
    }

    #[tokio::test]
    async fn refresh_takes_the_same_widening_path_as_load_more() {
        let store = test_store();
        // widens the limit like a "load more" would (fetch fails against
        // the closed port, the widened limit stays)
        assert!(store.refresh().await.is_err());
        assert_eq!(store.limit(), PAGE_STEP);

        // and respects the exhaustion latch
        store.merge_page(vec![feed_post(1, 100)]);
        store.merge_page(vec![feed_post(1, 100)]);
        assert!(!store.has_more());
        let limit_before = store.limit();
        assert!(store.refresh().await.is_ok());
        assert_eq!(store.limit(), limit_before);
    }

    #[tokio::test]
    async fn exhausted_feed_skips_the_fetch_entirely() {
        let store = test_store();
        store.merge_page(Vec::new()); // empty page on empty store: exhausted
        assert!(!store.has_more());

        let limit_before = store.limit();
        // would fail with a network error if it fetched
        assert!(store.load_more().await.is_ok());
        assert_eq!(store.limit(), limit_before);
    }

    #[test]
    fn like_membership_converges_under_interleaving() {
        let store = test_store();
        store.apply_insert(row(1, 100), UserBrief::default());

        // like, duplicate like (raced callbacks), then unlike
        assert!(store.set_liked(1, "u-2", true));
        assert!(!store.set_liked(1, "u-2", true));
        assert_eq!(store.snapshot()[0].post_likes.len(), 1);

        assert!(store.set_liked(1, "u-2", false));
        assert!(!store.set_liked(1, "u-2", false));
        assert!(store.snapshot()[0].post_likes.is_empty());

        // likes of other users are untouched
        store.set_liked(1, "u-3", true);
        store.set_liked(1, "u-2", true);
        store.set_liked(1, "u-2", false);
        let post = &store.snapshot()[0];
        assert_eq!(post.post_likes.len(), 1);
        assert!(post.liked_by("u-3"));
    }
}
