//! Authentication HTTP handlers
//!
//! Endpoints for the wallet nonce challenge and session tokens.

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::extract::WithRejection;
use std::net::SocketAddr;
use validator::Validate;

use super::OptionalUser;
use crate::auth::RequestMeta;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    HasNftsRequest, HasNftsResponse, JwtValidResponse, LoginRequest, LoginResponse,
    PreflightQuery, PreflightResponse,
};
use crate::state::AppState;

/// GET /auth/get_preflight - Fetch the message to sign for an address
pub async fn get_preflight(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    WithRejection(Query(query), _): WithRejection<Query<PreflightQuery>, ApiError>,
) -> ApiResult<Json<PreflightResponse>> {
    let preflight = state
        .auth_service
        .get_preflight(&query.address, user.is_some())
        .await?;

    Ok(Json(preflight))
}

/// POST /users/login - Verify a signed nonce and issue a session token
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let host_addr = connect_info.map(|ConnectInfo(addr)| addr.to_string());
    let meta = RequestMeta::from_headers(host_addr, &headers);

    let response = state
        .auth_service
        .login(&req.address, &req.signature, req.wallet_type, meta)
        .await?;

    Ok(Json(response))
}

/// GET /auth/jwt_valid - Report whether the presented token is valid
pub async fn jwt_valid(OptionalUser(user): OptionalUser) -> Json<JwtValidResponse> {
    Json(JwtValidResponse {
        valid: user.is_some(),
        user_id: user.map(|u| u.user_id),
    })
}

/// POST /auth/has_nfts - Whether any of a user's addresses holds a required token
pub async fn has_nfts(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<HasNftsRequest>, ApiError>,
) -> ApiResult<Json<HasNftsResponse>> {
    let has_nft = state
        .auth_service
        .user_has_required_tokens(req.user_id)
        .await?;

    Ok(Json(HasNftsResponse { has_nft }))
}
