//! User-related API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AddAddressResponse, AddressProofRequest, CreateUserResponse, GetUserQuery,
    RemoveAddressesRequest, UserResponse,
};
use crate::state::AppState;

/// POST /users/create - Create a user from a signed nonce
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<AddressProofRequest>, ApiError>,
) -> ApiResult<Json<CreateUserResponse>> {
    req.validate()?;

    let response = state.auth_service.create_user(&req).await?;
    Ok(Json(response))
}

/// POST /users/update/addresses/add - Link a proven address to the caller
pub async fn add_address(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Json(req), _): WithRejection<Json<AddressProofRequest>, ApiError>,
) -> ApiResult<Json<AddAddressResponse>> {
    req.validate()?;

    let response = state.auth_service.add_address(user.user_id, &req).await?;
    Ok(Json(response))
}

/// POST /users/update/addresses/remove - Unlink addresses from the caller
pub async fn remove_addresses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    WithRejection(Json(req), _): WithRejection<Json<RemoveAddressesRequest>, ApiError>,
) -> ApiResult<StatusCode> {
    req.validate()?;

    state
        .auth_service
        .remove_addresses(user.user_id, &req.addresses)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/get - Look up a user by ID, address or username
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<GetUserQuery>, ApiError>,
) -> ApiResult<Json<UserResponse>> {
    if query.user_id.is_none() && query.address.is_none() && query.username.is_none() {
        return Err(ApiError::ValidationError(
            "one of user_id, address or username is required".to_string(),
        ));
    }

    let user = state.auth_service.get_user(&query).await?;
    Ok(Json(user.into()))
}
