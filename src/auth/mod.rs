//! Authentication module: session state and the store that mutates it.
//!
//! `SessionState` holds the live credential/identity pair; `SessionStore`
//! drives its lifecycle (hydration, login, logout, registration) and persists
//! it through the injected `Storage`.

pub mod session;
pub mod store;

pub use session::{Credential, Identity, Role, Session, SessionSnapshot, SessionState};
pub use store::{AuthError, SessionStore};
