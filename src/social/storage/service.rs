//! Normalized storage service.

use crate::social::storage::api::{file_url, StorageApi};
use crate::social::storage::models::AvatarSource;
use crate::social::types::{ServiceError, ServiceResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct StorageService {
    api: Arc<StorageApi>,
    base_url: String,
}

impl StorageService {
    pub fn new(api: Arc<StorageApi>, base_url: String) -> Self {
        Self { api, base_url }
    }

    /// Upload a local file, returning the stored path.
    pub async fn upload_file(
        &self,
        folder: &str,
        local_uri: &str,
        is_image: bool,
    ) -> ServiceResult<String> {
        match self.api.upload_file(folder, local_uri, is_image).await {
            Ok(path) => Ok(path),
            Err(e) => {
                error!("[Storage] file upload error: {:?}", e);
                Err(ServiceError::new("Could not upload media"))
            }
        }
    }

    pub async fn download_file(&self, url: &str) -> ServiceResult<PathBuf> {
        match self.api.download_file(url).await {
            Ok(path) => Ok(path),
            Err(e) => {
                error!("[Storage] file download error: {:?}", e);
                Err(ServiceError::new("Could not download media"))
            }
        }
    }

    /// Public URL of a stored path.
    pub fn file_url(&self, path: &str) -> String {
        file_url(&self.base_url, path)
    }

    /// Avatar location for a user's `image` column.
    pub fn avatar_source(&self, image: Option<&str>) -> AvatarSource {
        match image {
            Some(path) if !path.is_empty() => AvatarSource::Remote(self.file_url(path)),
            _ => AvatarSource::Default,
        }
    }
}
