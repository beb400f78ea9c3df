//! Navigation module: route descriptors, the validated table, and the
//! guard-driven `Navigator`.

pub mod navigator;
pub mod route;

pub use navigator::{Location, Navigation, Navigator, RedirectReason};
pub use route::{AccessPolicy, RouteDescriptor, RouteName, RouteTable, RouterError};
