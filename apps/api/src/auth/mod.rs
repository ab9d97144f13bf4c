//! Auth collaborator: a thin client over the hosted auth REST API
//! (GoTrue-compatible `/auth/v1` endpoints) plus the session extractor and
//! auth routes.
//!
//! Every call goes to the hosted service; nothing about a session is cached
//! locally. State changes are broadcast to subscribers as `AuthEvent`s.

pub mod extract;
pub mod handlers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const AUTH_PATH: &str = "/auth/v1";
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session is missing, expired or revoked")]
    InvalidSession,

    #[error("auth service rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("auth service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected auth service response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: AuthUser,
}

/// Result of a sign-up. `session` is `None` while the address awaits
/// confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: Uuid },
    SignedUp { user_id: Uuid },
    SignedOut,
    PasswordRecovery,
    UserUpdated { user_id: Uuid },
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUp, AuthError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
    async fn reset_password(&self, email: &str) -> Result<(), AuthError>;
    async fn update_password(&self, access_token: &str, password: &str) -> Result<AuthUser, AuthError>;
    /// Resolves an access token to its user. This is the session check.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl From<WireUser> for AuthUser {
    fn from(user: WireUser) -> Self {
        AuthUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
            full_name: user
                .user_metadata
                .get("full_name")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSession {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: u64,
    user: WireUser,
}

impl From<WireSession> for Session {
    fn from(s: WireSession) -> Self {
        Session {
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            expires_in: s.expires_in,
            user: s.user.into(),
        }
    }
}

/// Sign-up answers with a session when confirmation is off, or with the bare
/// user when a confirmation email was sent.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSignUp {
    Session(WireSession),
    User(WireUser),
}

/// Pulls a readable message out of an auth error body. The service has used
/// `msg`, `error_description`, `message` and `error` over time.
fn auth_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

pub struct SupabaseAuthClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    site_url: String,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseAuthClient {
    pub fn new(auth_url: &str, anon_key: &str, site_url: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            client,
            base_url: format!("{}{AUTH_PATH}", auth_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            site_url: site_url.trim_end_matches('/').to_string(),
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("apikey", &self.anon_key)
    }

    fn emit(&self, event: AuthEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Sends a request and decodes a 2xx JSON body, mapping failures through
    /// `on_status` first so each endpoint can name its own 4xx meaning.
    async fn send_json<T>(
        &self,
        request: reqwest::RequestBuilder,
        on_status: fn(u16) -> Option<AuthError>,
    ) -> Result<T, AuthError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.send(request, on_status).await?;
        serde_json::from_str(&body).map_err(|e| AuthError::Malformed(e.to_string()))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        on_status: fn(u16) -> Option<AuthError>,
    ) -> Result<String, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(body);
        }
        debug!("Auth service returned {status}");
        Err(on_status(status.as_u16()).unwrap_or_else(|| AuthError::Rejected {
            status: status.as_u16(),
            message: auth_error_message(&body),
        }))
    }
}

fn credentials_status(status: u16) -> Option<AuthError> {
    matches!(status, 400 | 401).then_some(AuthError::InvalidCredentials)
}

fn session_status(status: u16) -> Option<AuthError> {
    matches!(status, 401 | 403).then_some(AuthError::InvalidSession)
}

fn no_special_status(_: u16) -> Option<AuthError> {
    None
}

#[async_trait]
impl AuthClient for SupabaseAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let request = self
            .post("/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let session: Session = self
            .send_json::<WireSession>(request, credentials_status)
            .await?
            .into();
        info!("User {} signed in", session.user.id);
        self.emit(AuthEvent::SignedIn {
            user_id: session.user.id,
        });
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUp, AuthError> {
        let redirect = format!("{}/auth/callback", self.site_url);
        let request = self
            .post("/signup")
            .query(&[("redirect_to", redirect.as_str())])
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name }
            }));
        let signup = match self.send_json::<WireSignUp>(request, no_special_status).await? {
            WireSignUp::Session(session) => {
                let session = Session::from(session);
                SignUp {
                    user: session.user.clone(),
                    session: Some(session),
                }
            }
            WireSignUp::User(user) => SignUp {
                user: user.into(),
                session: None,
            },
        };
        info!(
            "User {} signed up (confirmation pending: {})",
            signup.user.id,
            signup.session.is_none()
        );
        self.emit(AuthEvent::SignedUp {
            user_id: signup.user.id,
        });
        Ok(signup)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let request = self.post("/logout").bearer_auth(access_token);
        self.send(request, session_status).await?;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let redirect = format!("{}/auth/reset-password", self.site_url);
        let request = self
            .post("/recover")
            .query(&[("redirect_to", redirect.as_str())])
            .json(&json!({ "email": email }));
        self.send(request, no_special_status).await?;
        self.emit(AuthEvent::PasswordRecovery);
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> Result<AuthUser, AuthError> {
        let request = self
            .client
            .put(self.url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": password }));
        let user: AuthUser = self
            .send_json::<WireUser>(request, session_status)
            .await?
            .into();
        self.emit(AuthEvent::UserUpdated { user_id: user.id });
        Ok(user)
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let request = self
            .client
            .get(self.url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        Ok(self
            .send_json::<WireUser>(request, session_status)
            .await?
            .into())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
