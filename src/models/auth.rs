//! Authentication request/response DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::WalletAddress;

/// Query for GET /auth/get_preflight
#[derive(Debug, Deserialize)]
pub struct PreflightQuery {
    pub address: WalletAddress,
}

/// Challenge returned by preflight
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PreflightResponse {
    /// Full message to sign: fixed prefix followed by the nonce value
    pub nonce: String,
    pub user_exists: bool,
}

/// Request to log in with a signed challenge
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 1024))]
    pub signature: String,
    pub address: WalletAddress,
    #[serde(default)]
    pub wallet_type: i32,
}

/// Login outcome; a wrong signature is `signature_valid = false`, not an error
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginResponse {
    pub signature_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub address: WalletAddress,
}

/// Proof of address ownership for user creation and address linking
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct AddressProofRequest {
    #[validate(length(min = 1, max = 1024))]
    pub signature: String,
    /// Message the client signed; checked for contract wallets
    #[serde(default)]
    pub nonce: Option<String>,
    pub address: WalletAddress,
    #[serde(default)]
    pub wallet_type: i32,
}

/// Result of POST /users/create
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CreateUserResponse {
    pub signature_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Result of POST /users/update/addresses/add
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AddAddressResponse {
    pub signature_valid: bool,
}

/// Request to unlink addresses from the authenticated user
#[derive(Debug, Deserialize, Validate)]
pub struct RemoveAddressesRequest {
    #[validate(length(min = 1))]
    pub addresses: Vec<WalletAddress>,
}

/// Query for GET /users/get
#[derive(Debug, Deserialize, Default)]
pub struct GetUserQuery {
    pub user_id: Option<Uuid>,
    pub address: Option<WalletAddress>,
    pub username: Option<String>,
}

/// Request for POST /auth/has_nfts
#[derive(Debug, Deserialize)]
pub struct HasNftsRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HasNftsResponse {
    pub has_nft: bool,
}

/// Result of GET /auth/jwt_valid
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtValidResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}
