//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthChallengeService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthChallengeService>,
}

impl AppState {
    pub fn new(auth_service: Arc<AuthChallengeService>) -> Self {
        Self { auth_service }
    }
}

impl FromRef<AppState> for Arc<AuthChallengeService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}
