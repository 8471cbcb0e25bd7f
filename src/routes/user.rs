//! User route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::user;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/get", get(user::get_user))
        .route("/users/create", post(user::create_user))
        .route("/users/update/addresses/add", post(user::add_address))
        .route("/users/update/addresses/remove", post(user::remove_addresses))
}
