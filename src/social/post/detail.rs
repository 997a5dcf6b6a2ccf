//! One opened post: its full comment list, the comment channel merge and
//! the comment-side effects (notification to the post author).

use crate::social::client::ChangeHandler;
use crate::social::notification::types::{NewNotification, NotificationPayload};
use crate::social::notification::NotificationService;
use crate::social::post::service::PostService;
use crate::social::post::types::{CommentRow, NewComment, PostDetail};
use crate::social::types::{ChangeEvent, ChangeKind, ServiceResult};
use crate::social::user::UserService;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::{debug, warn};

struct DetailState {
    post: Option<PostDetail>,
    not_found: bool,
}

/// Store behind the post-detail screen. Comments arrive twice for the
/// author (the insert response is discarded, the channel echo is merged),
/// so merging dedupes by comment id.
pub struct PostDetailStore {
    post_id: i64,
    posts: PostService,
    users: UserService,
    notifications: NotificationService,
    state: Mutex<DetailState>,
}

impl PostDetailStore {
    pub fn new(
        post_id: i64,
        posts: PostService,
        users: UserService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            post_id,
            posts,
            users,
            notifications,
            state: Mutex::new(DetailState {
                post: None,
                not_found: false,
            }),
        }
    }

    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    pub fn snapshot(&self) -> Option<PostDetail> {
        self.state.lock().expect("detail state lock").post.clone()
    }

    /// Whether the last load came back without a row (deleted post, bad
    /// deep link).
    pub fn not_found(&self) -> bool {
        self.state.lock().expect("detail state lock").not_found
    }

    /// Fetch the post with its full comment list. A missing row flips the
    /// not-found flag instead of erroring.
    pub async fn load(&self) -> ServiceResult<()> {
        match self.posts.fetch_post_details(self.post_id).await {
            Ok(post) => {
                let mut state = self.state.lock().expect("detail state lock");
                state.post = Some(post);
                state.not_found = false;
                Ok(())
            }
            Err(e) => {
                warn!("[Detail] post {} not loadable: {}", self.post_id, e);
                self.state.lock().expect("detail state lock").not_found = true;
                Ok(())
            }
        }
    }

    /// Prepend a comment, deduplicating by id. Returns whether the list
    /// changed.
    pub fn apply_comment(&self, comment: CommentRow) -> bool {
        let mut state = self.state.lock().expect("detail state lock");
        let Some(post) = state.post.as_mut() else {
            return false;
        };
        if post.comments.iter().any(|c| c.id == comment.id) {
            debug!("[Detail] comment {} already present, dropping echo", comment.id);
            return false;
        }
        post.comments.insert(0, comment);
        true
    }

    /// Remove exactly the matching comment id. Returns whether it was
    /// present.
    pub fn apply_comment_removed(&self, comment_id: i64) -> bool {
        let mut state = self.state.lock().expect("detail state lock");
        let Some(post) = state.post.as_mut() else {
            return false;
        };
        let before = post.comments.len();
        post.comments.retain(|c| c.id != comment_id);
        post.comments.len() != before
    }

    /// Merge one pushed comment insert, hydrating the author the way the
    /// fetch embed would. Other event kinds are ignored; the channel is
    /// subscribed insert-only, filtered on this post id.
    pub async fn apply_event(&self, event: &ChangeEvent) {
        if event.kind != ChangeKind::Insert {
            return;
        }
        let Some(mut comment) = event
            .new
            .as_ref()
            .and_then(|v| serde_json::from_value::<CommentRow>(v.clone()).ok())
        else {
            warn!("[Detail] comment event without a usable row, dropping");
            return;
        };
        if comment.post_id != self.post_id {
            return;
        }
        if comment.user.is_none() {
            match self.users.get_user_data(&comment.user_id).await {
                Ok(user) => comment.user = Some(user.into()),
                Err(e) => {
                    warn!("[Detail] comment author lookup failed: {}", e);
                }
            }
        }
        self.apply_comment(comment);
    }

    /// Post a comment as `user_id`. Empty text (after trimming) is a local
    /// no-op. The created row is not merged locally; the channel echo is,
    /// which keeps author and echo paths identical.
    ///
    /// When the commenter is not the post author, a "Commented on your
    /// post" notification is written fire-and-forget.
    pub async fn add_comment(
        &self,
        user_id: &str,
        text: &str,
    ) -> ServiceResult<Option<CommentRow>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let comment = self
            .posts
            .create_comment(NewComment {
                user_id: user_id.to_string(),
                post_id: self.post_id,
                text: text.to_string(),
            })
            .await?;

        let author_id = {
            let state = self.state.lock().expect("detail state lock");
            state.post.as_ref().map(|p| p.user_id.clone())
        };
        if let Some(author_id) = author_id {
            if author_id != user_id {
                let notification = NewNotification {
                    sender_id: user_id.to_string(),
                    receiver_id: author_id,
                    title: "Commented on your post".to_string(),
                    data: NotificationPayload::new(self.post_id, Some(comment.id)).encode(),
                };
                if let Err(e) = self.notifications.create_notification(notification).await {
                    warn!("[Detail] comment notification failed: {}", e);
                }
            }
        }

        Ok(Some(comment))
    }

    /// Delete a comment, then drop exactly that id locally.
    pub async fn remove_comment(&self, comment_id: i64) -> ServiceResult<()> {
        self.posts.remove_comment(comment_id).await?;
        self.apply_comment_removed(comment_id);
        Ok(())
    }

    /// Delete the post itself; the caller leaves the screen afterwards.
    pub async fn remove_post(&self) -> ServiceResult<()> {
        self.posts.remove_post(self.post_id).await
    }

    /// The commenter and the post author may delete a comment.
    pub fn can_delete_comment(&self, comment: &CommentRow, viewer_id: &str) -> bool {
        if comment.user_id == viewer_id {
            return true;
        }
        let state = self.state.lock().expect("detail state lock");
        state
            .post
            .as_ref()
            .map(|p| p.user_id == viewer_id)
            .unwrap_or(false)
    }
}

#[async_trait]
impl ChangeHandler for PostDetailStore {
    async fn on_change(&self, event: ChangeEvent) {
        self.apply_event(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::notification::api::NotificationApi;
    use crate::social::post::api::PostApi;
    use crate::social::storage::api::StorageApi;
    use crate::social::storage::StorageService;
    use crate::social::types::epoch_ts;
    use crate::social::user::api::UserApi;
    use std::sync::Arc;

    fn test_store(post_id: i64) -> PostDetailStore {
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
        let users = UserService::new(
            Arc::new(UserApi::new(client.clone(), base.clone())),
            storage,
        );
        let notifications =
            NotificationService::new(Arc::new(NotificationApi::new(client, base)));
        PostDetailStore::new(post_id, posts, users, notifications)
    }

    fn seeded(post_id: i64, author: &str) -> PostDetailStore {
        let store = test_store(post_id);
        store.state.lock().unwrap().post = Some(PostDetail {
            id: post_id,
            user_id: author.to_string(),
            body: "<p>hello</p>".to_string(),
            file: None,
            created_at: epoch_ts(),
            user: None,
            post_likes: Vec::new(),
            comments: Vec::new(),
        });
        store
    }

    fn comment(id: i64, post_id: i64, user_id: &str) -> CommentRow {
        CommentRow {
            id,
            post_id,
            user_id: user_id.to_string(),
            text: "nice".to_string(),
            created_at: epoch_ts(),
            user: None,
        }
    }

    #[test]
    fn comment_echo_does_not_double_up() {
        let store = seeded(1, "author");
        assert!(store.apply_comment(comment(10, 1, "u-2")));
        // the echoed channel event for the same row
        assert!(!store.apply_comment(comment(10, 1, "u-2")));

        let post = store.snapshot().unwrap();
        assert_eq!(post.comments.len(), 1);
    }

    #[test]
    fn comments_are_prepended_newest_first() {
        let store = seeded(1, "author");
        store.apply_comment(comment(10, 1, "u-2"));
        store.apply_comment(comment(11, 1, "u-3"));

        let ids: Vec<i64> = store
            .snapshot()
            .unwrap()
            .comments
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn remove_drops_exactly_the_matching_comment() {
        let store = seeded(1, "author");
        store.apply_comment(comment(10, 1, "u-2"));
        store.apply_comment(comment(11, 1, "u-3"));

        assert!(store.apply_comment_removed(10));
        assert!(!store.apply_comment_removed(10));

        let post = store.snapshot().unwrap();
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].id, 11);
    }

    #[tokio::test]
    async fn events_for_other_posts_are_ignored() {
        let store = seeded(1, "author");
        let event = ChangeEvent {
            kind: ChangeKind::Insert,
            schema: "public".to_string(),
            table: "comments".to_string(),
            new: Some(serde_json::to_value(comment(10, 2, "u-2")).unwrap()),
            old: None,
        };
        store.apply_event(&event).await;
        assert!(store.snapshot().unwrap().comments.is_empty());
    }

    #[tokio::test]
    async fn empty_comment_text_is_a_local_no_op() {
        let store = seeded(1, "author");
        // no network happens, so this cannot fail against a closed port
        let created = store.add_comment("u-2", "   ").await.unwrap();
        assert!(created.is_none());
    }

    #[test]
    fn commenter_and_post_author_may_delete() {
        let store = seeded(1, "author");
        let c = comment(10, 1, "u-2");
        assert!(store.can_delete_comment(&c, "u-2"));
        assert!(store.can_delete_comment(&c, "author"));
        assert!(!store.can_delete_comment(&c, "u-3"));
    }
}
