//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/get_preflight", get(auth::get_preflight))
        .route("/auth/jwt_valid", get(auth::jwt_valid))
        .route("/auth/has_nfts", post(auth::has_nfts))
        .route("/users/login", post(auth::login))
}
