//! Object storage HTTP wrappers.

use crate::social::storage::models::MediaKind;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Bucket every upload lands in.
pub const BUCKET: &str = "uploads";

/// Public URL of a stored file, derived by string concatenation.
pub fn file_url(base_url: &str, path: &str) -> String {
    format!("{}/storage/v1/object/public/{}/{}", base_url, BUCKET, path)
}

/// Storage API client. `client` carries auth headers already.
pub struct StorageApi {
    client: reqwest::Client,
    base_url: String,
}

impl StorageApi {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Upload a local file into `folder`, returning the stored path
    /// (`{folder}/{timestamp}.{ext}`).
    pub async fn upload_file(&self, folder: &str, local_uri: &str, is_image: bool) -> Result<String> {
        let kind = if is_image {
            MediaKind::Image
        } else {
            MediaKind::Video
        };
        let local_path = local_uri.strip_prefix("file://").unwrap_or(local_uri);
        let bytes = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("failed to read local file: {}", local_path))?;

        let stored_path = format!(
            "{}/{}.{}",
            folder,
            chrono::Utc::now().timestamp_millis(),
            kind.extension()
        );
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, BUCKET, stored_path);
        info!(
            "[StorageAPI] uploading {} bytes to {}",
            bytes.len(),
            stored_path
        );

        let content_type = match kind {
            MediaKind::Image => "image/png",
            MediaKind::Video => "video/mp4",
        };
        let response = self
            .client
            .post(&url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .context("request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[StorageAPI] upload failed, status: {}, body: {}", status, body);
            return Err(anyhow::anyhow!("HTTP error {}: {}", status, body));
        }

        debug!("[StorageAPI] upload ok: {}", stored_path);
        Ok(stored_path)
    }

    /// Download a remote file to a temporary local path (used by the share
    /// flow).
    pub async fn download_file(&self, url: &str) -> Result<PathBuf> {
        debug!("[StorageAPI] downloading {}", url);
        let response = self.client.get(url).send().await.context("request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error {}", status));
        }
        let bytes = response.bytes().await.context("failed to read body")?;

        let file_name = url.rsplit('/').next().unwrap_or("download.bin");
        let local_path = std::env::temp_dir().join(file_name);
        tokio::fs::write(&local_path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", local_path.display()))?;
        Ok(local_path)
    }
}
