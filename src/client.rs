//! The client context object wiring the session, transport, and navigator.
//!
//! `Client` is the single instance an embedding front end constructs at
//! startup. Construction wires storage -> session state -> transport ->
//! session store -> navigator, installs the 401 recovery hook, and hydrates
//! the session from storage before handing the instance out, so no guard or
//! request can run against an uninitialized session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::api::{HttpClient, UnauthorizedHook};
use crate::auth::{SessionState, SessionStore};
use crate::config::Config;
use crate::router::{Navigator, RouteTable};
use crate::storage::{FileStorage, Storage};

/// Recovery run when any request comes back 401: clear the session, then
/// send the navigator to the login route. The failing call still surfaces
/// its error to the caller.
struct RecoveryHook {
    store: Arc<SessionStore>,
    navigator: Arc<Navigator>,
}

impl UnauthorizedHook for RecoveryHook {
    fn on_unauthorized(&self) {
        self.store.logout();
        self.navigator.redirect_to_login();
    }
}

/// Explicitly constructed application context. Lives for the whole process;
/// collaborators reach the session only through it.
pub struct Client {
    config: Config,
    http: HttpClient,
    store: Arc<SessionStore>,
    navigator: Arc<Navigator>,
}

impl Client {
    /// Build with the saved configuration, file-backed storage, and the
    /// built-in route table.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Session operations and read surface for views.
    pub fn session(&self) -> &SessionStore {
        &self.store
    }

    /// Route guard and current location.
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Transport for the remaining backend endpoints. Credential attachment
    /// and 401 recovery are already wired.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Builder for injecting configuration, storage, or a custom route table.
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<Config>,
    storage: Option<Arc<dyn Storage>>,
    routes: Option<RouteTable>,
}

impl ClientBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn build(self) -> Result<Client> {
        let config = match self.config {
            Some(config) => config,
            None => Config::load().context("Failed to load configuration")?,
        };
        let storage: Arc<dyn Storage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(
                FileStorage::new(Config::session_dir()?)
                    .context("Failed to open session storage")?,
            ),
        };

        let state = Arc::new(SessionState::new());
        let http =
            HttpClient::new(&config, state.clone()).context("Failed to build HTTP client")?;
        let store = Arc::new(SessionStore::new(state.clone(), storage, http.clone()));
        let navigator = Arc::new(Navigator::new(
            self.routes.unwrap_or_default(),
            state,
        ));

        http.install_unauthorized_hook(RecoveryHook {
            store: store.clone(),
            navigator: navigator.clone(),
        });

        // Hydrate before handing the client out: the first guard or request
        // must observe the stored session.
        store.initialize_from_storage();
        debug!(base_url = %config.base_url, "Client ready");

        Ok(Client {
            config,
            http,
            store,
            navigator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn test_config() -> Config {
        Config {
            base_url: "http://127.0.0.1:9/api".to_string(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_build_without_stored_session_starts_unauthenticated() {
        let client = Client::builder()
            .config(test_config())
            .storage(Arc::new(MemoryStorage::new()))
            .build()
            .unwrap();

        assert!(!client.session().is_authenticated());
        assert_eq!(client.session().user(), None);
    }

    #[test]
    fn test_build_hydrates_stored_session_before_handout() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("token", "tok-1").unwrap();
        storage
            .set("user", r#"{"username":"alice","role":"ADMIN","avatar":null}"#)
            .unwrap();

        let client = Client::builder()
            .config(test_config())
            .storage(storage)
            .build()
            .unwrap();

        assert!(client.session().is_authenticated());
        assert_eq!(client.session().user().unwrap().username, "alice");
    }
}
