//! Normalized post service: each function wraps one backend operation and
//! maps both error tiers to a fixed user-facing message.

use crate::social::post::api::PostApi;
use crate::social::post::types::{
    CommentRow, FeedPost, NewComment, NewPost, PostDetail, PostLikeRow, PostRow,
};
use crate::social::storage::models::MediaSource;
use crate::social::storage::StorageService;
use crate::social::types::{ServiceError, ServiceResult};
use std::sync::Arc;
use tracing::error;

/// A post draft as handed over by the composer.
#[derive(Debug, Clone)]
pub struct PostDraft {
    /// Present when editing an existing post.
    pub id: Option<i64>,
    pub user_id: String,
    pub body: String,
    pub file: Option<MediaSource>,
}

#[derive(Clone)]
pub struct PostService {
    api: Arc<PostApi>,
    storage: StorageService,
}

impl PostService {
    pub fn new(api: Arc<PostApi>, storage: StorageService) -> Self {
        Self { api, storage }
    }

    /// Create or update a post. A local attachment is uploaded first and
    /// replaced by its stored path; an upload failure is returned as-is and
    /// no upsert happens.
    pub async fn create_or_update_post(&self, draft: PostDraft) -> ServiceResult<PostRow> {
        let file = match draft.file {
            Some(MediaSource::Local { uri, kind }) => {
                let folder = kind.post_folder();
                let is_image = folder == "postImages";
                Some(self.storage.upload_file(folder, &uri, is_image).await?)
            }
            Some(MediaSource::Remote(path)) => Some(path),
            None => None,
        };

        let row = NewPost {
            id: draft.id,
            user_id: draft.user_id,
            body: draft.body,
            file,
        };
        match self.api.upsert_post(&row).await {
            Ok(post) => Ok(post),
            Err(e) => {
                error!("[Post] create or update post error: {:?}", e);
                Err(ServiceError::new("Couldn't create or update post"))
            }
        }
    }

    pub async fn fetch_posts(&self, limit: u32) -> ServiceResult<Vec<FeedPost>> {
        match self.api.fetch_posts(limit).await {
            Ok(posts) => Ok(posts),
            Err(e) => {
                error!("[Post] fetch posts error: {:?}", e);
                Err(ServiceError::new("Couldn't fetch the posts"))
            }
        }
    }

    pub async fn fetch_post_details(&self, post_id: i64) -> ServiceResult<PostDetail> {
        match self.api.fetch_post_details(post_id).await {
            Ok(post) => Ok(post),
            Err(e) => {
                error!("[Post] fetch post details error: {:?}", e);
                Err(ServiceError::new("Couldn't fetch the post details"))
            }
        }
    }

    pub async fn create_post_like(&self, like: PostLikeRow) -> ServiceResult<PostLikeRow> {
        match self.api.create_post_like(&like).await {
            Ok(row) => Ok(row),
            Err(e) => {
                error!("[Post] post like error: {:?}", e);
                Err(ServiceError::new("Couldn't like the post"))
            }
        }
    }

    pub async fn remove_post_like(&self, post_id: i64, user_id: &str) -> ServiceResult<()> {
        match self.api.remove_post_like(post_id, user_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("[Post] post unlike error: {:?}", e);
                Err(ServiceError::new("Couldn't remove the post like"))
            }
        }
    }

    pub async fn create_comment(&self, comment: NewComment) -> ServiceResult<CommentRow> {
        match self.api.create_comment(&comment).await {
            Ok(row) => Ok(row),
            Err(e) => {
                error!("[Post] comment error: {:?}", e);
                Err(ServiceError::new("Couldn't create the comment"))
            }
        }
    }

    pub async fn remove_comment(&self, comment_id: i64) -> ServiceResult<()> {
        match self.api.remove_comment(comment_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("[Post] delete comment error: {:?}", e);
                Err(ServiceError::new("Couldn't delete the comment"))
            }
        }
    }

    pub async fn remove_post(&self, post_id: i64) -> ServiceResult<()> {
        match self.api.remove_post(post_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("[Post] delete post error: {:?}", e);
                Err(ServiceError::new("Couldn't delete the post"))
            }
        }
    }
}
