//! User HTTP API wrappers over the relational query surface.

use crate::social::types::handle_rest_response;
use crate::social::user::models::{UserPatch, UserRow};
use anyhow::{Context, Result};
use tracing::{debug, info};

/// User-table API client.
///
/// `client` is expected to carry the `apikey` and `Authorization` headers
/// already (the client configures them as default headers).
pub struct UserApi {
    client: reqwest::Client,
    base_url: String,
}

impl UserApi {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Fetch a single user row by id.
    pub async fn get_user(&self, user_id: &str) -> Result<UserRow> {
        let url = format!("{}/rest/v1/users", self.base_url);
        debug!("[UserAPI] fetching user: {}", user_id);

        let response = self
            .client
            .get(&url)
            .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())])
            // single-object response instead of a one-element array
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<UserRow>(response, "fetch user").await
    }

    /// Patch a user row, returning the updated representation.
    pub async fn update_user(&self, user_id: &str, patch: &UserPatch) -> Result<UserRow> {
        let url = format!("{}/rest/v1/users", self.base_url);
        info!("[UserAPI] updating user: {}", user_id);

        let response = self
            .client
            .patch(&url)
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Accept", "application/vnd.pgrst.object+json")
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .context("request failed")?;

        handle_rest_response::<UserRow>(response, "update user").await
    }
}
