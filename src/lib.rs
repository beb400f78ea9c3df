//! Session, route guard, and API transport layer for EduVista front ends.
//!
//! The crate covers three tightly coupled concerns sharing one session:
//! - `auth`: the session store holding the credential and identity, with
//!   persistence through an injected `Storage`
//! - `router`: the navigation guard authorizing or redirecting transitions
//! - `api`: the transport attaching credentials outbound and recovering the
//!   session when the server answers 401
//!
//! An embedding front end constructs a single [`Client`] at startup and
//! drives everything through it:
//!
//! ```no_run
//! use eduvista_client::Client;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = Client::new()?;
//! if client.session().login("alice", "secret").await.is_ok() {
//!     let nav = client.navigator().navigate("/dashboard")?;
//!     assert!(nav.allowed);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod router;
pub mod storage;

pub use api::{ApiError, CredentialProvider, HttpClient, UnauthorizedHook};
pub use auth::{AuthError, Credential, Identity, Role, SessionSnapshot, SessionStore};
pub use client::{Client, ClientBuilder};
pub use config::Config;
pub use router::{
    AccessPolicy, Location, Navigation, Navigator, RedirectReason, RouteDescriptor, RouteName,
    RouteTable, RouterError,
};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
