//! Local draft state behind the "new post" screen. Nothing here persists;
//! closing the screen discards the draft.

use crate::social::post::service::{PostDraft, PostService};
use crate::social::post::types::PostRow;
use crate::social::storage::models::MediaSource;
use crate::social::types::{ServiceError, ServiceResult};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerPhase {
    Editing,
    Submitting,
}

/// Rich-text body plus at most one attachment. In edit mode the existing
/// post id rides along so the upsert updates in place.
pub struct PostComposer {
    post_id: Option<i64>,
    user_id: String,
    body: String,
    attachment: Option<MediaSource>,
    phase: ComposerPhase,
    service: PostService,
}

impl PostComposer {
    pub fn new(user_id: impl Into<String>, service: PostService) -> Self {
        Self {
            post_id: None,
            user_id: user_id.into(),
            body: String::new(),
            attachment: None,
            phase: ComposerPhase::Editing,
            service,
        }
    }

    /// Open an existing post for editing: body and stored attachment are
    /// pre-filled, the attachment as a remote path.
    pub fn edit(post: &PostRow, service: PostService) -> Self {
        Self {
            post_id: Some(post.id),
            user_id: post.user_id.clone(),
            body: post.body.clone(),
            attachment: post.file.clone().map(MediaSource::Remote),
            phase: ComposerPhase::Editing,
            service,
        }
    }

    pub fn phase(&self) -> ComposerPhase {
        self.phase
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachment(&self) -> Option<&MediaSource> {
        self.attachment.as_ref()
    }

    pub fn is_editing_existing(&self) -> bool {
        self.post_id.is_some()
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Picking a new attachment replaces the previous one; there is only
    /// one slot.
    pub fn attach(&mut self, media: MediaSource) {
        self.attachment = Some(media);
    }

    pub fn clear_attachment(&mut self) {
        self.attachment = None;
    }

    fn is_empty(&self) -> bool {
        self.body.trim().is_empty() && self.attachment.is_none()
    }

    /// Submit the draft. An empty draft is rejected before any network
    /// call. Success clears the draft; failure returns to editing with the
    /// draft intact.
    pub async fn submit(&mut self) -> ServiceResult<PostRow> {
        if self.is_empty() {
            return Err(ServiceError::new("Please choose an image or add post body"));
        }

        self.phase = ComposerPhase::Submitting;
        let draft = PostDraft {
            id: self.post_id,
            user_id: self.user_id.clone(),
            body: self.body.clone(),
            file: self.attachment.clone(),
        };

        match self.service.create_or_update_post(draft).await {
            Ok(post) => {
                info!("[Composer] post submitted: {}", post.id);
                self.body.clear();
                self.attachment = None;
                self.post_id = None;
                self.phase = ComposerPhase::Editing;
                Ok(post)
            }
            Err(e) => {
                self.phase = ComposerPhase::Editing;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::post::api::PostApi;
    use crate::social::storage::api::StorageApi;
    use crate::social::storage::models::MediaKind;
    use crate::social::storage::StorageService;
    use crate::social::types::epoch_ts;
    use std::sync::Arc;

    fn test_service() -> PostService {
        let client = reqwest::Client::new();
        let base = "http://localhost:9".to_string();
        let storage = StorageService::new(
            Arc::new(StorageApi::new(client.clone(), base.clone())),
            base.clone(),
        );
        PostService::new(Arc::new(PostApi::new(client, base)), storage)
    }

    #[tokio::test]
    async fn empty_draft_is_rejected_before_any_network_call() {
        // the service points at a closed port; a network attempt would
        // surface a different error than the local validation message
        let mut composer = PostComposer::new("u-1", test_service());
        composer.set_body("   \n ");
        let err = composer.submit().await.unwrap_err();
        assert_eq!(err.msg, "Please choose an image or add post body");
        assert_eq!(composer.phase(), ComposerPhase::Editing);
    }

    #[tokio::test]
    async fn attachment_alone_is_enough_to_submit() {
        let mut composer = PostComposer::new("u-1", test_service());
        composer.attach(MediaSource::local("file:///nope.png", MediaKind::Image));
        // passes validation, then fails on the network; the draft survives
        let err = composer.submit().await.unwrap_err();
        assert_ne!(err.msg, "Please choose an image or add post body");
        assert_eq!(composer.phase(), ComposerPhase::Editing);
        assert!(composer.attachment().is_some());
    }

    #[test]
    fn picking_an_attachment_replaces_the_previous_one() {
        let mut composer = PostComposer::new("u-1", test_service());
        composer.attach(MediaSource::local("file:///a.png", MediaKind::Image));
        composer.attach(MediaSource::local("file:///b.mp4", MediaKind::Video));
        match composer.attachment() {
            Some(MediaSource::Local { kind, .. }) => assert_eq!(*kind, MediaKind::Video),
            other => panic!("unexpected attachment: {:?}", other),
        }

        composer.clear_attachment();
        assert!(composer.attachment().is_none());
    }

    #[test]
    fn edit_mode_prefills_from_the_existing_post() {
        let post = PostRow {
            id: 7,
            user_id: "u-1".to_string(),
            body: "<p>old</p>".to_string(),
            file: Some("postImages/7.png".to_string()),
            created_at: epoch_ts(),
        };
        let composer = PostComposer::edit(&post, test_service());
        assert!(composer.is_editing_existing());
        assert_eq!(composer.body(), "<p>old</p>");
        match composer.attachment() {
            Some(MediaSource::Remote(path)) => assert_eq!(path, "postImages/7.png"),
            other => panic!("unexpected attachment: {:?}", other),
        }
    }
}
