//! Transport module for the EduVista backend API.
//!
//! Provides the `HttpClient` with its outbound credential hook and inbound
//! 401 recovery hook, plus the `ApiError` taxonomy the rest of the crate
//! folds transport failures into.

pub mod client;
pub mod error;

pub use client::{CredentialProvider, HttpClient, UnauthorizedHook};
pub use error::ApiError;
