//! Authentication: sign-up/sign-in/sign-out against the backend auth
//! provider, plus the session store.
//!
//! There is no global mutable auth state. [`SessionStore`] holds an
//! immutable snapshot behind a lock and is only updated through a single
//! reducer applied to [`AuthEvent`]s, with a listener notified after each
//! reduction.

use crate::social::types::{ServiceError, ServiceResult};
use crate::social::user::models::UserRow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

/// The user identity carried by the auth provider's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// An authenticated session as returned by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: AuthUser,
}

/// Current signed-in state: the session plus the full profile row once it
/// has been fetched from the `users` table.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub session: Session,
    pub profile: Option<UserRow>,
}

/// Session-change events fed to the reducer.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    UserUpdated(UserRow),
}

/// Auth state callbacks, JSON payloads.
#[async_trait]
pub trait AuthListener: Send + Sync {
    /// A session was established; payload is the session JSON.
    async fn on_signed_in(&self, session_json: String);

    /// The session ended.
    async fn on_signed_out(&self);

    /// The signed-in user's profile row changed; payload is the row JSON.
    async fn on_user_updated(&self, user_json: String);
}

/// Default no-op listener.
pub struct EmptyAuthListener;

#[async_trait]
impl AuthListener for EmptyAuthListener {
    async fn on_signed_in(&self, _session_json: String) {}
    async fn on_signed_out(&self) {}
    async fn on_user_updated(&self, _user_json: String) {}
}

/// Holds the current session snapshot; all mutation goes through
/// [`SessionStore::apply`].
pub struct SessionStore {
    state: RwLock<Option<SessionState>>,
    listener: RwLock<Arc<dyn AuthListener>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            listener: RwLock::new(Arc::new(EmptyAuthListener)),
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn AuthListener>) {
        *self.listener.write().expect("session listener lock") = listener;
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> Option<SessionState> {
        self.state.read().expect("session state lock").clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current().map(|s| s.session.access_token)
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|s| s.session.user.id)
    }

    /// The single reducer over session-change events.
    pub async fn apply(&self, event: AuthEvent) {
        let listener = self.listener.read().expect("session listener lock").clone();
        match event {
            AuthEvent::SignedIn(session) => {
                let json = serde_json::to_string(&session).unwrap_or_else(|_| "{}".to_string());
                info!("[Auth] signed in: user={}", session.user.id);
                *self.state.write().expect("session state lock") = Some(SessionState {
                    session,
                    profile: None,
                });
                listener.on_signed_in(json).await;
            }
            AuthEvent::SignedOut => {
                info!("[Auth] signed out");
                *self.state.write().expect("session state lock") = None;
                listener.on_signed_out().await;
            }
            AuthEvent::UserUpdated(row) => {
                let json = serde_json::to_string(&row).unwrap_or_else(|_| "{}".to_string());
                let mut guard = self.state.write().expect("session state lock");
                match guard.as_mut() {
                    Some(state) => {
                        debug!("[Auth] profile updated: user={}", row.id);
                        state.profile = Some(row);
                    }
                    // profile updates without a session are dropped
                    None => return,
                }
                drop(guard);
                listener.on_user_updated(json).await;
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct SignUpMetadata<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Error body of the auth provider: older endpoints use
/// `error`/`error_description`, newer ones `msg`.
#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl AuthErrorBody {
    fn message(self) -> String {
        self.error_description
            .or(self.msg)
            .or(self.error)
            .unwrap_or_else(|| "Something went wrong!".to_string())
    }
}

/// Thin wrappers around the auth provider's HTTP endpoints.
pub struct AuthApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthApi {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    async fn send_session_request(
        &self,
        url: String,
        body: impl Serialize,
        operation_name: &str,
    ) -> ServiceResult<Session> {
        debug!("[AuthAPI] {} url: {}", operation_name, url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("[AuthAPI] {} request failed: {}", operation_name, e);
                ServiceError::new("Something went wrong!")
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            error!("[AuthAPI] {} failed to read body: {}", operation_name, e);
            ServiceError::new("Something went wrong!")
        })?;

        if !status.is_success() {
            let msg = serde_json::from_slice::<AuthErrorBody>(&bytes)
                .map(AuthErrorBody::message)
                .unwrap_or_else(|_| "Something went wrong!".to_string());
            error!("[AuthAPI] {} failed, status: {}, msg: {}", operation_name, status, msg);
            return Err(ServiceError::new(msg));
        }

        serde_json::from_slice::<Session>(&bytes).map_err(|e| {
            error!(
                "[AuthAPI] {} response parse failed: {}, raw: {}",
                operation_name,
                e,
                String::from_utf8_lossy(&bytes)
            );
            ServiceError::new("Something went wrong!")
        })
    }

    /// Register a new account. The display name travels as signup metadata;
    /// a trigger on the backend mirrors it into the `users` table.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> ServiceResult<Session> {
        info!("[AuthAPI] signing up: {}", email);
        let url = format!("{}/auth/v1/signup", self.base_url);
        let body = SignUpRequest {
            email,
            password,
            data: SignUpMetadata { name },
        };
        self.send_session_request(url, body, "sign up").await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Session> {
        info!("[AuthAPI] signing in: {}", email);
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let body = PasswordGrantRequest { email, password };
        self.send_session_request(url, body, "sign in").await
    }

    pub async fn sign_out(&self, access_token: &str) -> ServiceResult<()> {
        info!("[AuthAPI] signing out");
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!("[AuthAPI] sign out request failed: {}", e);
                ServiceError::new("Something went wrong!")
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("[AuthAPI] sign out failed, status: {}, body: {}", status, body);
            return Err(ServiceError::new("Something went wrong!"));
        }
        Ok(())
    }
}

/// Local form validation, applied before any network call.
pub fn validate_sign_up(name: &str, email: &str, password: &str) -> ServiceResult<()> {
    if name.trim().is_empty() || email.trim().is_empty() || password.trim().is_empty() {
        return Err(ServiceError::new("please fill all the fields!"));
    }
    Ok(())
}

/// Local form validation, applied before any network call.
pub fn validate_sign_in(email: &str, password: &str) -> ServiceResult<()> {
    if email.trim().is_empty() || password.trim().is_empty() {
        return Err(ServiceError::new("please fill all the fields!"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: &str) -> Session {
        Session {
            access_token: "tok".to_string(),
            user: AuthUser {
                id: user_id.to_string(),
                email: "a@b.c".to_string(),
            },
        }
    }

    fn user_row(id: &str, name: &str) -> UserRow {
        UserRow {
            id: id.to_string(),
            name: name.to_string(),
            ..UserRow::default()
        }
    }

    #[tokio::test]
    async fn reducer_sign_in_then_profile_fetch() {
        let store = SessionStore::new();
        assert!(store.current().is_none());

        store.apply(AuthEvent::SignedIn(session("u-1"))).await;
        let state = store.current().unwrap();
        assert_eq!(state.session.user.id, "u-1");
        assert!(state.profile.is_none());

        store
            .apply(AuthEvent::UserUpdated(user_row("u-1", "Ada")))
            .await;
        let state = store.current().unwrap();
        assert_eq!(state.profile.unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn reducer_sign_out_clears_everything() {
        let store = SessionStore::new();
        store.apply(AuthEvent::SignedIn(session("u-1"))).await;
        store
            .apply(AuthEvent::UserUpdated(user_row("u-1", "Ada")))
            .await;
        store.apply(AuthEvent::SignedOut).await;
        assert!(store.current().is_none());
        assert!(store.access_token().is_none());
    }

    #[tokio::test]
    async fn profile_update_without_session_is_dropped() {
        let store = SessionStore::new();
        store
            .apply(AuthEvent::UserUpdated(user_row("u-1", "Ada")))
            .await;
        assert!(store.current().is_none());
    }

    #[test]
    fn empty_credentials_are_rejected_locally() {
        // the login and sign-up alerts use the lowercase wording
        assert_eq!(
            validate_sign_in("", "pw").unwrap_err().msg,
            "please fill all the fields!"
        );
        assert!(validate_sign_in("a@b.c", "   ").is_err());
        assert!(validate_sign_in("a@b.c", "pw").is_ok());

        assert_eq!(
            validate_sign_up("", "a@b.c", "pw").unwrap_err().msg,
            "please fill all the fields!"
        );
        assert!(validate_sign_up("Ada", "a@b.c", "pw").is_ok());
    }
}
