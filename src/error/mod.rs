//! Centralized API error handling for the gallery backend
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{AuthError, SignatureError};

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No nonce found for address: {0}")]
    NonceNotFound(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Required tokens not owned by address: {0}")]
    AddressDoesNotOwnRequiredNft(String),

    #[error("User already exists with address: {0}")]
    UserAlreadyExists(String),

    #[error("Incorrect nonce input")]
    NonceMismatch,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Unsupported wallet type: {0}")]
    UnsupportedWalletType(String),

    #[error("User does not have enough addresses to remove")]
    CannotRemoveAllAddresses,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NonceNotFound(_) => "NONCE_NOT_FOUND",
            ApiError::UserNotFound => "USER_NOT_FOUND",
            ApiError::AddressDoesNotOwnRequiredNft(_) => "ADDRESS_DOES_NOT_OWN_REQUIRED_NFT",
            ApiError::UserAlreadyExists(_) => "USER_ALREADY_EXISTS",
            ApiError::NonceMismatch => "NONCE_MISMATCH",
            ApiError::InvalidSignature(_) => "INVALID_SIGNATURE",
            ApiError::UnsupportedWalletType(_) => "UNSUPPORTED_WALLET_TYPE",
            ApiError::CannotRemoveAllAddresses => "CANNOT_REMOVE_ALL_ADDRESSES",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NonceNotFound(_) | ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::AddressDoesNotOwnRequiredNft(_) => StatusCode::FORBIDDEN,
            ApiError::UserAlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::NonceMismatch
            | ApiError::InvalidSignature(_)
            | ApiError::UnsupportedWalletType(_)
            | ApiError::CannotRemoveAllAddresses
            | ApiError::BadRequest(_)
            | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InternalError(_) | ApiError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message sent to the client; infra details stay in the logs
    fn public_message(&self) -> String {
        match self {
            ApiError::InternalError(_) | ApiError::DatabaseError(_) => {
                "Internal server error".to_string()
            }
            ApiError::ExternalServiceError(_) => "Upstream service unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Log server errors
        if status.is_server_error() {
            tracing::error!(error = %self, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = %error_code, "Client error occurred");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.public_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NonceNotFound(address) => ApiError::NonceNotFound(address.to_string()),
            AuthError::UserNotFound => ApiError::UserNotFound,
            AuthError::UserAlreadyExistsWithAddress(address) => {
                ApiError::UserAlreadyExists(address.to_string())
            }
            AuthError::AddressDoesNotOwnRequiredNft(address) => {
                ApiError::AddressDoesNotOwnRequiredNft(address.to_string())
            }
            AuthError::NonceMismatch => ApiError::NonceMismatch,
            AuthError::CannotRemoveAllAddresses => ApiError::CannotRemoveAllAddresses,
            AuthError::Signature(SignatureError::UnsupportedWalletType(e)) => {
                ApiError::UnsupportedWalletType(e.0.to_string())
            }
            AuthError::Signature(e) => ApiError::InvalidSignature(e.to_string()),
            AuthError::Chain(e) => ApiError::ExternalServiceError(e.to_string()),
            AuthError::Token(e) => ApiError::InternalError(e.to_string()),
            AuthError::Database(e) => ApiError::DatabaseError(e.to_string()),
        }
    }
}

// Convenience conversions from common error types

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use crate::models::UnsupportedWalletType;
    use crate::persist::PersistError;

    #[test]
    fn test_error_codes() {
        assert_eq!(ApiError::UserNotFound.error_code(), "USER_NOT_FOUND");
        assert_eq!(ApiError::NonceMismatch.error_code(), "NONCE_MISMATCH");
        assert_eq!(
            ApiError::AddressDoesNotOwnRequiredNft("0x".to_string()).error_code(),
            "ADDRESS_DOES_NOT_OWN_REQUIRED_NFT"
        );
        assert_eq!(
            ApiError::ValidationError("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::NonceNotFound("0x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::AddressDoesNotOwnRequiredNft("0x".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::UserAlreadyExists("0x".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::ExternalServiceError("rpc".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(
            ApiError::from(AuthError::Signature(SignatureError::UnsupportedWalletType(
                UnsupportedWalletType(9)
            ))),
            ApiError::UnsupportedWalletType(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::Signature(SignatureError::InvalidSignatureRecoveryId(5))),
            ApiError::InvalidSignature(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::Chain(ChainError::Timeout)),
            ApiError::ExternalServiceError(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::Database(PersistError::CorruptRecord("x".into()))),
            ApiError::DatabaseError(_)
        ));
    }

    #[test]
    fn test_infra_details_not_exposed() {
        let err = ApiError::DatabaseError("password authentication failed".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = ApiError::NonceMismatch;
        assert_eq!(err.public_message(), "Incorrect nonce input");
    }
}
