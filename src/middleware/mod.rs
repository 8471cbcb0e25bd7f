//! Middleware for the gallery API
//!
//! Bearer-token extraction and request tracing.

pub mod auth;
mod tracing;

pub use auth::{AuthenticatedUser, OptionalUser};
pub use tracing::request_tracing;
