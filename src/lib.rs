//! Gallery Backend Library
//!
//! Wallet-based authentication for the gallery API: nonce challenges,
//! EOA and EIP-1271 signature verification, session tokens and the
//! login-attempt audit trail.

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;

pub mod auth;
pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod persist;
pub mod routes;
pub mod state;

use state::AppState;

/// API router with tracing and a per-request deadline.
///
/// Dropping the handler future on timeout cancels any in-flight database or
/// RPC call.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(routes::auth_routes())
        .merge(routes::user_routes())
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
