//! Post HTTP API wrappers: one backend operation per function.

use crate::social::post::types::{
    CommentRow, FeedPost, NewComment, NewPost, PostDetail, PostLikeRow, PostRow,
};
use crate::social::types::handle_rest_response;
use anyhow::{Context, Result};
use tracing::{debug, info};

/// The embed string of the feed query: author, likes and comment count in
/// one request.
const FEED_SELECT: &str = "*,user:users(id,name,image),post_likes(*),comments(count)";

/// The embed string of the detail query: full comments with their authors.
const DETAIL_SELECT: &str = "*,user:users(id,name,image),post_likes(*),comments(*,user:users(id,name,image))";

pub struct PostApi {
    client: reqwest::Client,
    base_url: String,
}

impl PostApi {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// The newest `limit` posts with author, likes and comment count.
    pub async fn fetch_posts(&self, limit: u32) -> Result<Vec<FeedPost>> {
        let url = format!("{}/rest/v1/posts", self.base_url);
        debug!("[PostAPI] fetching posts, limit: {}", limit);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("select", FEED_SELECT.to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<Vec<FeedPost>>(response, "fetch posts").await
    }

    /// A single post with its full comment list, comments newest first.
    pub async fn fetch_post_details(&self, post_id: i64) -> Result<PostDetail> {
        let url = format!("{}/rest/v1/posts", self.base_url);
        debug!("[PostAPI] fetching post details: {}", post_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("select", DETAIL_SELECT.to_string()),
                ("id", format!("eq.{}", post_id)),
                ("comments.order", "created_at.desc".to_string()),
            ])
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<PostDetail>(response, "fetch post details").await
    }

    /// Insert or update a post row, returning the stored representation.
    pub async fn upsert_post(&self, post: &NewPost) -> Result<PostRow> {
        let url = format!("{}/rest/v1/posts", self.base_url);
        info!(
            "[PostAPI] upserting post (id: {:?}, user: {})",
            post.id, post.user_id
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/vnd.pgrst.object+json")
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(post)
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<PostRow>(response, "upsert post").await
    }

    pub async fn remove_post(&self, post_id: i64) -> Result<()> {
        let url = format!("{}/rest/v1/posts", self.base_url);
        info!("[PostAPI] deleting post: {}", post_id);

        let response = self
            .client
            .delete(&url)
            .query(&[("id", format!("eq.{}", post_id))])
            .send()
            .await
            .context("request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("HTTP error {}: {}", status, body));
        }
        Ok(())
    }

    pub async fn create_post_like(&self, like: &PostLikeRow) -> Result<PostLikeRow> {
        let url = format!("{}/rest/v1/post_likes", self.base_url);
        debug!(
            "[PostAPI] liking post {} as {}",
            like.post_id, like.user_id
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/vnd.pgrst.object+json")
            .header("Prefer", "return=representation")
            .json(like)
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<PostLikeRow>(response, "create post like").await
    }

    pub async fn remove_post_like(&self, post_id: i64, user_id: &str) -> Result<()> {
        let url = format!("{}/rest/v1/post_likes", self.base_url);
        debug!("[PostAPI] unliking post {} as {}", post_id, user_id);

        let response = self
            .client
            .delete(&url)
            .query(&[
                ("post_id", format!("eq.{}", post_id)),
                ("user_id", format!("eq.{}", user_id)),
            ])
            .send()
            .await
            .context("request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("HTTP error {}: {}", status, body));
        }
        Ok(())
    }

    pub async fn create_comment(&self, comment: &NewComment) -> Result<CommentRow> {
        let url = format!("{}/rest/v1/comments", self.base_url);
        debug!("[PostAPI] commenting on post {}", comment.post_id);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/vnd.pgrst.object+json")
            .header("Prefer", "return=representation")
            .json(comment)
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<CommentRow>(response, "create comment").await
    }

    pub async fn remove_comment(&self, comment_id: i64) -> Result<()> {
        let url = format!("{}/rest/v1/comments", self.base_url);
        debug!("[PostAPI] deleting comment: {}", comment_id);

        let response = self
            .client
            .delete(&url)
            .query(&[("id", format!("eq.{}", comment_id))])
            .send()
            .await
            .context("request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("HTTP error {}: {}", status, body));
        }
        Ok(())
    }
}
