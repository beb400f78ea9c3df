//! Session store: login, logout, registration, and storage hydration.
//!
//! All mutating operations replace credential and identity together through
//! `SessionState::replace`, and none of them let a transport or storage error
//! escape - callers always get a plain success/failure result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, HttpClient};
use crate::storage::Storage;

use super::session::{Credential, Identity, Role, Session, SessionSnapshot, SessionState};

/// Storage key holding the raw credential string
const TOKEN_KEY: &str = "token";

/// Storage key holding the serialized identity
const USER_KEY: &str = "user";

/// Legacy sentinel some storage backends write for an absent identity
const NULL_SENTINEL: &str = "null";

/// Fallback message when a login failure carries no server message
const LOGIN_FALLBACK: &str = "Login failed";

/// Fallback message when a registration failure carries no server message
const REGISTER_FALLBACK: &str = "Registration failed";

/// Failure result of a session operation, always carrying a message fit to
/// show the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

impl AuthError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Fold a transport error into the uniform failure shape: keep the
    /// server's message when it sent one, otherwise use the generic fallback.
    fn from_api(err: &ApiError, fallback: &str) -> Self {
        match err.server_message() {
            Some(message) if !message.is_empty() => Self::new(message),
            _ => Self::new(fallback),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
    username: String,
    role: Role,
    #[serde(default)]
    avatar: Option<String>,
}

/// Single-instance store owning the session lifecycle.
pub struct SessionStore {
    state: Arc<SessionState>,
    storage: Arc<dyn Storage>,
    http: HttpClient,
}

impl SessionStore {
    pub fn new(state: Arc<SessionState>, storage: Arc<dyn Storage>, http: HttpClient) -> Self {
        Self {
            state,
            storage,
            http,
        }
    }

    /// Hydrate the session from storage. Runs once at startup, before any
    /// navigation or request; a hydrated credential authenticates subsequent
    /// requests without per-call wiring. Corrupt or orphaned entries are
    /// discarded and purged - this never fails past this point.
    pub fn initialize_from_storage(&self) {
        let token = match self.storage.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                None
            }
        };

        let Some(credential) = token.and_then(Credential::new) else {
            // No credential means no session; drop any orphaned identity so
            // memory and storage agree.
            self.purge_entry(TOKEN_KEY);
            self.purge_entry(USER_KEY);
            self.state.replace(None);
            debug!("No stored session");
            return;
        };

        let identity = self.read_stored_identity();
        debug!(has_identity = identity.is_some(), "Session hydrated from storage");
        self.state.replace(Some(Session {
            credential,
            identity,
        }));
    }

    /// Authenticate against the backend. On success the session is set and
    /// persisted atomically; on failure the session is left unchanged and the
    /// result carries the server's message or a generic fallback.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let request = LoginRequest { username, password };
        let data = match self.http.post::<LoginData, _>("/auth/login", &request).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                warn!("Login response carried no session data");
                return Err(AuthError::new(LOGIN_FALLBACK));
            }
            Err(e) => {
                warn!(error = %e, "Login request failed");
                return Err(AuthError::from_api(&e, LOGIN_FALLBACK));
            }
        };

        let Some(credential) = Credential::new(data.token) else {
            warn!("Login response carried an empty token");
            return Err(AuthError::new(LOGIN_FALLBACK));
        };
        let identity = Identity {
            username: data.username,
            role: data.role,
            avatar: data.avatar,
        };

        self.persist(&credential, &identity);
        info!(user = %identity.username, role = %identity.role, "Login successful");
        self.state.replace(Some(Session {
            credential,
            identity: Some(identity),
        }));
        Ok(())
    }

    /// Clear the session in memory and in storage. Idempotent; never fails.
    pub fn logout(&self) {
        let was_authenticated = self.state.is_authenticated();
        self.state.replace(None);
        self.purge_entry(TOKEN_KEY);
        self.purge_entry(USER_KEY);
        if was_authenticated {
            info!("Logged out");
        }
    }

    /// Create an account. Same result shape as `login`, but the session is
    /// never touched - registration does not imply login.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<(), AuthError> {
        let request = RegisterRequest {
            username,
            password,
            email,
        };
        match self
            .http
            .post::<serde_json::Value, _>("/auth/register", &request)
            .await
        {
            Ok(_) => {
                info!(user = username, "Registration accepted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Registration request failed");
                Err(AuthError::from_api(&e, REGISTER_FALLBACK))
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn user(&self) -> Option<Identity> {
        self.state.user()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Observe session changes; see `SessionState::subscribe`.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    fn read_stored_identity(&self) -> Option<Identity> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored identity");
                return None;
            }
        };

        if raw == NULL_SENTINEL {
            self.purge_entry(USER_KEY);
            return None;
        }
        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!(error = %e, "Discarding unparsable stored identity");
                self.purge_entry(USER_KEY);
                None
            }
        }
    }

    fn persist(&self, credential: &Credential, identity: &Identity) {
        if let Err(e) = self.storage.set(TOKEN_KEY, credential.as_str()) {
            warn!(error = %e, "Failed to persist credential");
        }
        match serde_json::to_string(identity) {
            Ok(serialized) => {
                if let Err(e) = self.storage.set(USER_KEY, &serialized) {
                    warn!(error = %e, "Failed to persist identity");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize identity"),
        }
    }

    fn purge_entry(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!(key, error = %e, "Failed to remove storage entry");
        }
    }
}
