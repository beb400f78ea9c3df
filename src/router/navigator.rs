//! Navigation controller: the synchronous guard run before every transition.
//!
//! The guard reads an already-resident snapshot of the session and never
//! suspends. Redirect targets re-enter the guard, so a chain like
//! login -> landing -> fallback settles in one `navigate` call; chains are
//! capped to keep a misconfigured table from looping.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{SessionSnapshot, SessionState};

use super::route::{RouteDescriptor, RouteName, RouteTable, RouterError};

/// Upper bound on guard re-entries in a single resolution. A table whose
/// designated routes redirect into each other settles on the last target.
const MAX_REDIRECT_HOPS: usize = 8;

/// A resolved position: the route, its concrete path, and - when the guard
/// bounced an unauthenticated request to login - the originally requested
/// path to resume after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub name: RouteName,
    pub path: String,
    pub return_to: Option<String>,
}

impl Location {
    /// Path with the return destination rendered as a query parameter,
    /// e.g. `/login?redirect=/students/7`. The value is percent-encoded so
    /// a destination containing query syntax stays unambiguous.
    pub fn full_path(&self) -> String {
        match &self.return_to {
            Some(redirect) => format!("{}?redirect={}", self.path, encode_query_value(redirect)),
            None => self.path.clone(),
        }
    }
}

/// Percent-encode a query parameter value. Unreserved characters and `/`
/// pass through, keeping plain paths readable.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Why the guard aborted a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RedirectReason {
    /// Target requires a session and there is none; `return_to` carries the
    /// requested path.
    Unauthenticated { return_to: String },
    /// Target restricts roles and the session's role is not in the set.
    RoleDenied,
    /// The login route was requested with a session already active.
    AlreadyAuthenticated,
}

/// Outcome of a guarded transition. `allowed` is true only when the
/// requested route was entered directly; `redirect` holds the first reason
/// the guard aborted, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub location: Location,
    pub allowed: bool,
    pub redirect: Option<RedirectReason>,
}

enum GuardDecision {
    Allow,
    Redirect {
        target: String,
        reason: RedirectReason,
    },
}

/// Owns the route table and the current location; every transition runs
/// through the guard.
pub struct Navigator {
    table: RouteTable,
    state: Arc<SessionState>,
    current: RwLock<Location>,
}

impl Navigator {
    pub fn new(table: RouteTable, state: Arc<SessionState>) -> Self {
        let current = Location {
            name: table.login().clone(),
            path: table.login_path().to_string(),
            return_to: None,
        };
        Self {
            table,
            state,
            current: RwLock::new(current),
        }
    }

    /// Run the guard for `path` against the current session without moving.
    /// The root path resolves to the landing route.
    pub fn resolve(&self, path: &str) -> Result<Navigation, RouterError> {
        let snapshot = self.state.snapshot();
        let requested = if path == "/" {
            self.table.landing_path().to_string()
        } else {
            path.to_string()
        };

        let mut current_path = requested.clone();
        let mut first_redirect: Option<RedirectReason> = None;
        let mut pending_return: Option<String> = None;

        for _ in 0..MAX_REDIRECT_HOPS {
            let route = self.match_route(&current_path)?;
            match self.guard(route, &requested, &snapshot) {
                GuardDecision::Allow => {
                    return Ok(Navigation {
                        location: Location {
                            name: route.name.clone(),
                            path: current_path,
                            return_to: pending_return,
                        },
                        allowed: first_redirect.is_none(),
                        redirect: first_redirect,
                    });
                }
                GuardDecision::Redirect { target, reason } => {
                    debug!(from = %current_path, to = %target, reason = ?reason, "Guard redirecting");
                    pending_return = match &reason {
                        RedirectReason::Unauthenticated { return_to } => Some(return_to.clone()),
                        _ => None,
                    };
                    if first_redirect.is_none() {
                        first_redirect = Some(reason);
                    }
                    current_path = target;
                }
            }
        }

        debug!(path = %current_path, "Redirect hop limit reached, settling");
        let route = self.match_route(&current_path)?;
        Ok(Navigation {
            location: Location {
                name: route.name.clone(),
                path: current_path,
                return_to: pending_return,
            },
            allowed: false,
            redirect: first_redirect,
        })
    }

    /// Resolve `path` and move the current location to the outcome.
    /// Landing on the location already current changes nothing.
    pub fn navigate(&self, path: &str) -> Result<Navigation, RouterError> {
        let navigation = self.resolve(path)?;
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if *current != navigation.location {
            debug!(from = %current.path, to = %navigation.location.path, "Navigated");
            *current = navigation.location.clone();
        }
        Ok(navigation)
    }

    /// Transition to the login route. Used by session recovery after a 401;
    /// re-running it for a second concurrent 401 is a no-op.
    pub fn redirect_to_login(&self) {
        // The login path always resolves on a validated table.
        if let Err(e) = self.navigate(self.table.login_path()) {
            warn!(error = %e, "Failed to redirect to login");
        }
    }

    pub fn current(&self) -> Location {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    fn match_route(&self, path: &str) -> Result<&RouteDescriptor, RouterError> {
        self.table
            .match_path(path)
            .ok_or_else(|| RouterError::UnknownPath(path.to_string()))
    }

    /// The guard proper. Precedence: missing session beats missing role;
    /// the login shortcut only applies once the auth and role checks pass.
    fn guard(
        &self,
        route: &RouteDescriptor,
        requested: &str,
        snapshot: &SessionSnapshot,
    ) -> GuardDecision {
        if route.policy.requires_auth {
            if !snapshot.authenticated {
                return GuardDecision::Redirect {
                    target: self.table.login_path().to_string(),
                    reason: RedirectReason::Unauthenticated {
                        return_to: requested.to_string(),
                    },
                };
            }
            if let Some(roles) = &route.policy.roles {
                let permitted = snapshot
                    .user
                    .as_ref()
                    .is_some_and(|user| roles.contains(&user.role));
                if !permitted {
                    return GuardDecision::Redirect {
                        target: self.table.fallback_path().to_string(),
                        reason: RedirectReason::RoleDenied,
                    };
                }
            }
        }

        if route.name == *self.table.login() && snapshot.authenticated {
            return GuardDecision::Redirect {
                target: self.table.landing_path().to_string(),
                reason: RedirectReason::AlreadyAuthenticated,
            };
        }

        GuardDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, Identity, Role, Session};
    use crate::router::route::{DASHBOARD, LOGIN, STUDENT_DETAIL, STUDENT_LIST};

    fn session(role: Role) -> Session {
        Session {
            credential: Credential::new("tok").unwrap(),
            identity: Some(Identity {
                username: "alice".to_string(),
                role,
                avatar: None,
            }),
        }
    }

    fn navigator() -> (Navigator, Arc<SessionState>) {
        let state = Arc::new(SessionState::new());
        (Navigator::new(RouteTable::default(), state.clone()), state)
    }

    #[test]
    fn test_unauthenticated_is_sent_to_login_with_return_destination() {
        let (navigator, _state) = navigator();
        let nav = navigator.navigate("/students/7").unwrap();

        assert!(!nav.allowed);
        assert_eq!(nav.location.name, LOGIN);
        assert_eq!(nav.location.return_to.as_deref(), Some("/students/7"));
        assert_eq!(nav.location.full_path(), "/login?redirect=/students/7");
        assert_eq!(
            nav.redirect,
            Some(RedirectReason::Unauthenticated {
                return_to: "/students/7".to_string()
            })
        );
    }

    #[test]
    fn test_full_path_encodes_query_syntax_in_return_destination() {
        let location = Location {
            name: LOGIN,
            path: "/login".to_string(),
            return_to: Some("/students?page=2&sort=name".to_string()),
        };
        assert_eq!(
            location.full_path(),
            "/login?redirect=/students%3Fpage%3D2%26sort%3Dname"
        );
    }

    #[test]
    fn test_auth_check_takes_precedence_over_role_check() {
        // Unauthenticated request for an admin-only route goes to login,
        // never to the role fallback.
        let (navigator, _state) = navigator();
        let nav = navigator.navigate("/dashboard").unwrap();

        assert_eq!(nav.location.name, LOGIN);
        assert!(matches!(
            nav.redirect,
            Some(RedirectReason::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_role_mismatch_falls_back_to_student_list() {
        let (navigator, state) = navigator();
        state.replace(Some(session(Role::Student)));

        let nav = navigator.navigate("/dashboard").unwrap();
        assert!(!nav.allowed);
        assert_eq!(nav.location.name, STUDENT_LIST);
        assert_eq!(nav.redirect, Some(RedirectReason::RoleDenied));

        let edit = navigator.navigate("/students/7/edit").unwrap();
        assert_eq!(edit.location.name, STUDENT_LIST);
    }

    #[test]
    fn test_admin_passes_role_restricted_routes() {
        let (navigator, state) = navigator();
        state.replace(Some(session(Role::Admin)));

        let nav = navigator.navigate("/dashboard").unwrap();
        assert!(nav.allowed);
        assert_eq!(nav.location.name, DASHBOARD);
        assert_eq!(nav.redirect, None);
    }

    #[test]
    fn test_authenticated_login_request_lands_on_dashboard() {
        let (navigator, state) = navigator();
        state.replace(Some(session(Role::Admin)));

        let nav = navigator.navigate("/login").unwrap();
        assert!(!nav.allowed);
        assert_eq!(nav.location.name, DASHBOARD);
        assert_eq!(nav.redirect, Some(RedirectReason::AlreadyAuthenticated));
    }

    #[test]
    fn test_redirect_chain_settles_through_reentrant_guard() {
        // A logged-in student asking for /login bounces to the landing route,
        // whose admin restriction then forwards to the fallback.
        let (navigator, state) = navigator();
        state.replace(Some(session(Role::Student)));

        let nav = navigator.navigate("/login").unwrap();
        assert_eq!(nav.location.name, STUDENT_LIST);
        assert_eq!(nav.redirect, Some(RedirectReason::AlreadyAuthenticated));
    }

    #[test]
    fn test_root_path_resolves_to_landing_route() {
        let (navigator, state) = navigator();
        state.replace(Some(session(Role::Admin)));

        let nav = navigator.navigate("/").unwrap();
        assert_eq!(nav.location.name, DASHBOARD);
        assert!(nav.allowed);
    }

    #[test]
    fn test_param_route_allowed_when_authenticated() {
        let (navigator, state) = navigator();
        state.replace(Some(session(Role::Student)));

        let nav = navigator.navigate("/students/42").unwrap();
        assert!(nav.allowed);
        assert_eq!(nav.location.name, STUDENT_DETAIL);
        assert_eq!(nav.location.path, "/students/42");
    }

    #[test]
    fn test_unknown_path_is_an_error() {
        let (navigator, _state) = navigator();
        assert_eq!(
            navigator.navigate("/nowhere").unwrap_err(),
            RouterError::UnknownPath("/nowhere".to_string())
        );
    }

    #[test]
    fn test_redirect_to_login_is_idempotent() {
        let (navigator, _state) = navigator();
        navigator.redirect_to_login();
        let first = navigator.current();
        navigator.redirect_to_login();
        assert_eq!(navigator.current(), first);
        assert_eq!(first.name, LOGIN);
    }

    #[test]
    fn test_corrupt_identity_session_is_treated_as_role_denied() {
        // Credential without identity: authenticated, but no role to satisfy
        // a restricted route.
        let (navigator, state) = navigator();
        state.replace(Some(Session {
            credential: Credential::new("tok").unwrap(),
            identity: None,
        }));

        let nav = navigator.navigate("/dashboard").unwrap();
        assert_eq!(nav.location.name, STUDENT_LIST);
        assert_eq!(nav.redirect, Some(RedirectReason::RoleDenied));

        let list = navigator.navigate("/students").unwrap();
        assert!(list.allowed);
    }
}
