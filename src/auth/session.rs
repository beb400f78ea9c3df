//! Session state shared between the store, the transport, and the navigator.
//!
//! `SessionState` is the single owner of the live session. Every mutation
//! replaces credential and identity together under one write lock, so readers
//! never observe a half-updated session. Collaborators read through snapshots
//! or through the narrow `CredentialProvider` capability.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::api::CredentialProvider;

/// Opaque bearer token proving authentication. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token string, rejecting the empty string.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// User role as the backend reports it. The named variants cover the roles
/// the backend assigns; anything else is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Student,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "ADMIN",
            Role::Student => "STUDENT",
            Role::Other(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(wire: String) -> Self {
        match wire.as_str() {
            "ADMIN" => Role::Admin,
            "STUDENT" => Role::Student,
            _ => Role::Other(wire),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile data identifying the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// An active session: a credential plus the identity it was issued for.
/// The identity may be absent after corrupt-data recovery; the credential
/// alone still authenticates requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: Credential,
    pub identity: Option<Identity>,
}

/// Read-only view of the session at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    pub user: Option<Identity>,
}

/// Single owner of the live session.
pub struct SessionState {
    inner: RwLock<Option<Session>>,
    notify: watch::Sender<SessionSnapshot>,
}

impl SessionState {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: RwLock::new(None),
            notify,
        }
    }

    /// Replace the whole session. Passing `None` clears it.
    pub fn replace(&self, session: Option<Session>) {
        let snapshot = {
            let mut guard = self.write();
            *guard = session;
            Self::snapshot_of(&guard)
        };
        self.notify.send_replace(snapshot);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        Self::snapshot_of(&self.read())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn user(&self) -> Option<Identity> {
        self.read().as_ref().and_then(|s| s.identity.clone())
    }

    /// Receiver that observes every session change, starting from the
    /// current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.notify.subscribe()
    }

    fn snapshot_of(session: &Option<Session>) -> SessionSnapshot {
        SessionSnapshot {
            authenticated: session.is_some(),
            user: session.as_ref().and_then(|s| s.identity.clone()),
        }
    }

    // The session is replaced whole, so a poisoned lock still holds a
    // consistent value.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for SessionState {
    fn current_credential(&self) -> Option<Credential> {
        self.read().as_ref().map(|s| s.credential.clone())
    }
}
