//! Post, like and comment wire types.

use crate::social::types::epoch_ts;
use crate::social::user::models::UserBrief;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `posts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRow {
    pub id: i64,
    pub user_id: String,
    /// Rich-text HTML produced by the embedded editor.
    #[serde(default)]
    pub body: String,
    /// Stored path of the attached media, when any.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "epoch_ts")]
    pub created_at: DateTime<Utc>,
}

/// Upsert shape for creating or editing a post. With `id` present the
/// backend updates in place.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: String,
    pub body: String,
    pub file: Option<String>,
}

/// One `(post, user)` like pair; existence implies "liked". The backend
/// enforces the pair unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostLikeRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub post_id: i64,
    pub user_id: String,
}

impl PostLikeRow {
    pub fn new(post_id: i64, user_id: impl Into<String>) -> Self {
        Self {
            id: None,
            post_id,
            user_id: user_id.into(),
        }
    }
}

/// One row of the `comments` table, with the author embedded on reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "epoch_ts")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<UserBrief>,
}

/// Insert shape for a new comment.
#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub user_id: String,
    pub post_id: i64,
    pub text: String,
}

/// The `comments (count)` aggregate embed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentCount {
    #[serde(default)]
    pub count: i64,
}

/// A feed entry as returned by the paginated query: the post plus its
/// author, its likes and the comment count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: i64,
    pub user_id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "epoch_ts")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<UserBrief>,
    #[serde(default)]
    pub post_likes: Vec<PostLikeRow>,
    #[serde(default)]
    pub comments: Vec<CommentCount>,
}

impl FeedPost {
    /// A pushed insert only carries the bare row; likes start empty and
    /// the comment count at zero, the author is hydrated separately.
    pub fn from_row(row: PostRow, user: UserBrief) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            body: row.body,
            file: row.file,
            created_at: row.created_at,
            user: Some(user),
            post_likes: Vec::new(),
            comments: vec![CommentCount { count: 0 }],
        }
    }

    pub fn comment_count(&self) -> i64 {
        self.comments.iter().map(|c| c.count).sum()
    }

    pub fn liked_by(&self, user_id: &str) -> bool {
        self.post_likes.iter().any(|l| l.user_id == user_id)
    }
}

/// A single post with its full comment list (comments newest first, as
/// ordered by the server).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: i64,
    pub user_id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "epoch_ts")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<UserBrief>,
    #[serde(default)]
    pub post_likes: Vec<PostLikeRow>,
    #[serde(default)]
    pub comments: Vec<CommentRow>,
}
