//! Normalized user service: profile fetch and edit.

use crate::social::storage::models::MediaSource;
use crate::social::storage::StorageService;
use crate::social::types::{ServiceError, ServiceResult};
use crate::social::user::api::UserApi;
use crate::social::user::models::{ProfileUpdate, UserPatch, UserRow};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Clone)]
pub struct UserService {
    api: Arc<UserApi>,
    storage: StorageService,
}

impl UserService {
    pub fn new(api: Arc<UserApi>, storage: StorageService) -> Self {
        Self { api, storage }
    }

    /// Fetch a user row. This is the one service that surfaces the
    /// backend's own error message instead of a fixed string.
    pub async fn get_user_data(&self, user_id: &str) -> ServiceResult<UserRow> {
        match self.api.get_user(user_id).await {
            Ok(row) => Ok(row),
            Err(e) => {
                error!("[User] fetch user error: {:?}", e);
                Err(ServiceError::new(e.to_string()))
            }
        }
    }

    /// Submit the profile edit form. All fields are required; a local
    /// avatar file is uploaded first. An avatar upload failure drops the
    /// image instead of failing the whole edit.
    pub async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> ServiceResult<UserRow> {
        validate_profile_update(&update)?;

        let image = match update.image {
            Some(MediaSource::Local { uri, .. }) => {
                match self.storage.upload_file("profiles", &uri, true).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!("[User] avatar upload failed, keeping no image: {}", e);
                        None
                    }
                }
            }
            Some(MediaSource::Remote(path)) => Some(path),
            None => None,
        };

        let patch = UserPatch {
            name: update.name,
            phone_number: update.phone_number,
            address: update.address,
            bio: update.bio,
            image,
        };
        match self.api.update_user(user_id, &patch).await {
            Ok(row) => Ok(row),
            Err(e) => {
                error!("[User] update profile error: {:?}", e);
                Err(ServiceError::new("Couldn't update the profile"))
            }
        }
    }
}

/// Local form validation, applied before any network call.
pub fn validate_profile_update(update: &ProfileUpdate) -> ServiceResult<()> {
    if update.name.trim().is_empty()
        || update.phone_number.trim().is_empty()
        || update.address.trim().is_empty()
        || update.bio.trim().is_empty()
        || update.image.is_none()
    {
        return Err(ServiceError::new("Please fill all the fields"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::storage::models::MediaKind;

    fn full_update() -> ProfileUpdate {
        ProfileUpdate {
            name: "Ada".to_string(),
            phone_number: "12345".to_string(),
            address: "Somewhere".to_string(),
            bio: "Hi".to_string(),
            image: Some(MediaSource::Remote("profiles/1.png".to_string())),
        }
    }

    #[test]
    fn profile_update_requires_every_field() {
        assert!(validate_profile_update(&full_update()).is_ok());

        let mut missing_bio = full_update();
        missing_bio.bio = "   ".to_string();
        assert!(validate_profile_update(&missing_bio).is_err());

        let mut missing_image = full_update();
        missing_image.image = None;
        assert!(validate_profile_update(&missing_image).is_err());
    }

    #[test]
    fn local_avatar_counts_as_present() {
        let mut update = full_update();
        update.image = Some(MediaSource::local("file:///tmp/a.png", MediaKind::Image));
        assert!(validate_profile_update(&update).is_ok());
    }
}
