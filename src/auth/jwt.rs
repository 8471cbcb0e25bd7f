//! Session tokens
//!
//! Stateless HS256 JWTs carrying the user ID and an expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const ISSUER: &str = "gallery";

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub user_id: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and parses session tokens with a server-held secret
#[derive(Clone)]
pub struct SessionIssuer {
    secret: String,
    ttl_seconds: i64,
}

impl SessionIssuer {
    pub fn new(secret: String, ttl_seconds: i64) -> Self {
        Self {
            secret,
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token for a verified user
    pub fn issue(&self, user_id: Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl_seconds);

        let claims = Claims {
            user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Validate signature, issuer and expiry, returning the user ID
    pub fn parse(&self, token: &str) -> Result<Uuid, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::InvalidToken(e.to_string()),
        })?;

        Ok(token_data.claims.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_parse() {
        let issuer = SessionIssuer::new("test-secret-key".to_string(), 900);
        let user_id = Uuid::new_v4();

        let token = issuer.issue(user_id).unwrap();
        assert!(!token.is_empty());
        assert_eq!(issuer.parse(&token).unwrap(), user_id);
    }

    #[test]
    fn test_expired_token() {
        let issuer = SessionIssuer::new("test-secret-key".to_string(), -120);
        let token = issuer.issue(Uuid::new_v4()).unwrap();

        assert!(matches!(issuer.parse(&token), Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_invalid_token() {
        let issuer = SessionIssuer::new("test-secret-key".to_string(), 900);
        assert!(matches!(
            issuer.parse("invalid.token.here"),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let token = SessionIssuer::new("secret1".to_string(), 900)
            .issue(Uuid::new_v4())
            .unwrap();
        let result = SessionIssuer::new("secret2".to_string(), 900).parse(&token);
        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_tampered_token() {
        let issuer = SessionIssuer::new("test-secret-key".to_string(), 900);
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        let other = issuer.issue(Uuid::new_v4()).unwrap();

        // Claims of one token with the signature of another
        let mut parts: Vec<&str> = token.split('.').collect();
        let other_sig = other.split('.').nth(2).unwrap();
        parts[2] = other_sig;
        assert!(issuer.parse(&parts.join(".")).is_err());
    }
}
