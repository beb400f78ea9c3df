//! Route descriptors and the validated route table.
//!
//! Routes are static configuration: a symbolic name, a path pattern, and an
//! access policy. The table designates exactly one public login route, a
//! post-login landing route, and a fallback route for role mismatches.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;

/// Built-in route names, mirroring the product's views.
pub const LOGIN: RouteName = RouteName::from_static("Login");
pub const DASHBOARD: RouteName = RouteName::from_static("Dashboard");
pub const STUDENT_LIST: RouteName = RouteName::from_static("StudentList");
pub const STUDENT_DETAIL: RouteName = RouteName::from_static("StudentDetail");
pub const STUDENT_EDIT: RouteName = RouteName::from_static("StudentEdit");
pub const GALLERY: RouteName = RouteName::from_static("Gallery");

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouterError {
    #[error("Route table has no public route to designate as login")]
    NoLoginRoute,

    #[error("Route table has more than one public route")]
    MultipleLoginRoutes,

    #[error("Designated route {0} is not in the table")]
    UnknownRoute(RouteName),

    #[error("Designated route {0} has a parameterized path")]
    ParameterizedTarget(RouteName),

    #[error("No route matches path {0}")]
    UnknownPath(String),
}

/// Symbolic name of a routable view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteName(Cow<'static, str>);

impl RouteName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who may enter a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub requires_auth: bool,
    pub roles: Option<Vec<Role>>,
}

impl AccessPolicy {
    /// Open to everyone, authenticated or not.
    pub fn public() -> Self {
        Self {
            requires_auth: false,
            roles: None,
        }
    }

    /// Requires a session, any role.
    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            roles: None,
        }
    }

    /// Requires a session whose identity holds one of the given roles.
    pub fn restricted(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            requires_auth: true,
            roles: Some(roles.into_iter().collect()),
        }
    }
}

/// Static description of a navigable view. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub name: RouteName,
    pub path: String,
    pub policy: AccessPolicy,
}

impl RouteDescriptor {
    pub fn new(name: RouteName, path: impl Into<String>, policy: AccessPolicy) -> Self {
        Self {
            name,
            path: path.into(),
            policy,
        }
    }

    /// Match a concrete path against this route's pattern. `:param` segments
    /// match any single non-empty segment.
    pub fn matches(&self, path: &str) -> bool {
        let pattern: Vec<&str> = segments(&self.path).collect();
        let concrete: Vec<&str> = segments(path).collect();
        pattern.len() == concrete.len()
            && pattern
                .iter()
                .zip(&concrete)
                .all(|(p, c)| p.starts_with(':') || p == c)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Validated set of routes plus the three designated roles a guard needs:
/// the login route, the post-login landing route, and the fallback route
/// for insufficient roles.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    login: RouteName,
    landing: RouteName,
    fallback: RouteName,
    login_path: String,
    landing_path: String,
    fallback_path: String,
}

impl RouteTable {
    /// Build a custom table. The single route with `requires_auth == false`
    /// becomes the login route; `landing` and `fallback` must name existing
    /// routes with static paths.
    pub fn new(
        routes: Vec<RouteDescriptor>,
        landing: RouteName,
        fallback: RouteName,
    ) -> Result<Self, RouterError> {
        let mut public = routes.iter().filter(|r| !r.policy.requires_auth);
        let login_route = public.next().ok_or(RouterError::NoLoginRoute)?;
        if public.next().is_some() {
            return Err(RouterError::MultipleLoginRoutes);
        }
        let login = login_route.name.clone();
        let login_path = Self::static_path(&routes, &login)?;
        let landing_path = Self::static_path(&routes, &landing)?;
        let fallback_path = Self::static_path(&routes, &fallback)?;

        Ok(Self {
            routes,
            login,
            landing,
            fallback,
            login_path,
            landing_path,
            fallback_path,
        })
    }

    fn static_path(routes: &[RouteDescriptor], name: &RouteName) -> Result<String, RouterError> {
        let route = routes
            .iter()
            .find(|r| r.name == *name)
            .ok_or_else(|| RouterError::UnknownRoute(name.clone()))?;
        if route.path.contains(':') {
            return Err(RouterError::ParameterizedTarget(name.clone()));
        }
        Ok(route.path.clone())
    }

    /// First route whose pattern matches the concrete path.
    pub fn match_path(&self, path: &str) -> Option<&RouteDescriptor> {
        self.routes.iter().find(|r| r.matches(path))
    }

    pub fn login(&self) -> &RouteName {
        &self.login
    }

    pub fn landing(&self) -> &RouteName {
        &self.landing
    }

    pub fn fallback(&self) -> &RouteName {
        &self.fallback
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    pub fn fallback_path(&self) -> &str {
        &self.fallback_path
    }
}

impl Default for RouteTable {
    /// The product's route table: dashboard and student editing are
    /// admin-only, everything but login requires a session.
    fn default() -> Self {
        // Constructed directly; the fields are known to satisfy `new`'s rules.
        Self {
            routes: vec![
                RouteDescriptor::new(LOGIN, "/login", AccessPolicy::public()),
                RouteDescriptor::new(DASHBOARD, "/dashboard", AccessPolicy::restricted([Role::Admin])),
                RouteDescriptor::new(STUDENT_LIST, "/students", AccessPolicy::authenticated()),
                RouteDescriptor::new(STUDENT_DETAIL, "/students/:id", AccessPolicy::authenticated()),
                RouteDescriptor::new(
                    STUDENT_EDIT,
                    "/students/:id/edit",
                    AccessPolicy::restricted([Role::Admin]),
                ),
                RouteDescriptor::new(GALLERY, "/gallery", AccessPolicy::authenticated()),
            ],
            login: LOGIN,
            landing: DASHBOARD,
            fallback: STUDENT_LIST,
            login_path: "/login".to_string(),
            landing_path: "/dashboard".to_string(),
            fallback_path: "/students".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_designations() {
        let table = RouteTable::default();
        assert_eq!(table.login(), &LOGIN);
        assert_eq!(table.landing(), &DASHBOARD);
        assert_eq!(table.fallback(), &STUDENT_LIST);
        assert_eq!(table.login_path(), "/login");
    }

    #[test]
    fn test_match_path_with_params() {
        let table = RouteTable::default();
        assert_eq!(table.match_path("/students").unwrap().name, STUDENT_LIST);
        assert_eq!(table.match_path("/students/7").unwrap().name, STUDENT_DETAIL);
        assert_eq!(
            table.match_path("/students/7/edit").unwrap().name,
            STUDENT_EDIT
        );
        assert!(table.match_path("/nowhere").is_none());
        assert!(table.match_path("/students/7/delete").is_none());
    }

    #[test]
    fn test_table_requires_exactly_one_public_route() {
        let no_public = RouteTable::new(
            vec![RouteDescriptor::new(
                DASHBOARD,
                "/dashboard",
                AccessPolicy::authenticated(),
            )],
            DASHBOARD,
            DASHBOARD,
        );
        assert_eq!(no_public.unwrap_err(), RouterError::NoLoginRoute);

        let two_public = RouteTable::new(
            vec![
                RouteDescriptor::new(LOGIN, "/login", AccessPolicy::public()),
                RouteDescriptor::new(GALLERY, "/gallery", AccessPolicy::public()),
                RouteDescriptor::new(DASHBOARD, "/dashboard", AccessPolicy::authenticated()),
            ],
            DASHBOARD,
            DASHBOARD,
        );
        assert_eq!(two_public.unwrap_err(), RouterError::MultipleLoginRoutes);
    }

    #[test]
    fn test_table_rejects_missing_or_parameterized_targets() {
        let routes = vec![
            RouteDescriptor::new(LOGIN, "/login", AccessPolicy::public()),
            RouteDescriptor::new(STUDENT_DETAIL, "/students/:id", AccessPolicy::authenticated()),
        ];
        let missing = RouteTable::new(routes.clone(), DASHBOARD, STUDENT_DETAIL);
        assert_eq!(missing.unwrap_err(), RouterError::UnknownRoute(DASHBOARD));

        let parameterized = RouteTable::new(routes, STUDENT_DETAIL, STUDENT_DETAIL);
        assert_eq!(
            parameterized.unwrap_err(),
            RouterError::ParameterizedTarget(STUDENT_DETAIL)
        );
    }
}
