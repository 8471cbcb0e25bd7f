//! Authentication service
//!
//! Nonce challenge/response for wallet owners: preflight issues or returns
//! the active nonce, login/creation/linking verify a signature over it and
//! rotate it on success so the same signature cannot be replayed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use super::jwt::{JwtError, SessionIssuer};
use super::login_attempts::{LoginAttemptRecorder, RequestMeta};
use super::nonce::{challenge_message, generate_nonce};
use super::signature::{SignatureError, SignatureVerifier};
use crate::chain::{ChainClient, ChainError, RequiredTokens};
use crate::models::{
    AddAddressResponse, AddressProofRequest, CreateUserResponse, GetUserQuery, LoginAttempt,
    LoginResponse, Nonce, PreflightResponse, User, WalletAddress, WalletType,
};
use crate::persist::{NonceRepository, PersistError, UserRepository};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No nonce found for address: {0}")]
    NonceNotFound(WalletAddress),

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists with address: {0}")]
    UserAlreadyExistsWithAddress(WalletAddress),

    #[error("Required tokens not owned by address: {0}")]
    AddressDoesNotOwnRequiredNft(WalletAddress),

    #[error("Incorrect nonce input")]
    NonceMismatch,

    #[error("User does not have enough addresses to remove")]
    CannotRemoveAllAddresses,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Database error: {0}")]
    Database(PersistError),
}

impl From<PersistError> for AuthError {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::NonceNotFoundForAddress(address) => AuthError::NonceNotFound(address),
            PersistError::UserNotFound => AuthError::UserNotFound,
            PersistError::AddressAlreadyOwned(address) => {
                AuthError::UserAlreadyExistsWithAddress(address)
            }
            other => AuthError::Database(other),
        }
    }
}

/// Registration and on-chain settings, fixed at startup
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub required_tokens: RequiredTokens,
    pub require_nft_for_registration: bool,
    pub chain_call_timeout: Duration,
}

/// Wallet authentication service
#[derive(Clone)]
pub struct AuthChallengeService {
    users: Arc<dyn UserRepository>,
    nonces: Arc<dyn NonceRepository>,
    chain: Arc<dyn ChainClient>,
    verifier: SignatureVerifier,
    sessions: SessionIssuer,
    login_attempts: LoginAttemptRecorder,
    settings: AuthSettings,
}

impl AuthChallengeService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        nonces: Arc<dyn NonceRepository>,
        chain: Arc<dyn ChainClient>,
        sessions: SessionIssuer,
        login_attempts: LoginAttemptRecorder,
        settings: AuthSettings,
    ) -> Self {
        let verifier = SignatureVerifier::new(chain.clone(), settings.chain_call_timeout);
        Self {
            users,
            nonces,
            chain,
            verifier,
            sessions,
            login_attempts,
            settings,
        }
    }

    /// Session issuer (for middleware access)
    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Return the challenge for `address`, issuing a nonce for newcomers.
    ///
    /// Unregistered addresses must hold a required token unless the caller
    /// is already authenticated; no nonce is created when that check fails.
    pub async fn get_preflight(
        &self,
        address: &WalletAddress,
        already_authenticated: bool,
    ) -> Result<PreflightResponse, AuthError> {
        if self.users.get_by_address(address).await?.is_some() {
            let nonce = self.nonces.get(address).await?;
            return Ok(PreflightResponse {
                nonce: challenge_message(&nonce.value),
                user_exists: true,
            });
        }

        if !already_authenticated && self.settings.require_nft_for_registration {
            let owns = self.owns_required_tokens(address).await?;
            if !owns {
                tracing::info!(%address, "Preflight rejected, required token not held");
                return Err(AuthError::AddressDoesNotOwnRequiredNft(address.clone()));
            }
        }

        let nonce = self
            .nonces
            .create(Nonce::new(address.clone(), generate_nonce()))
            .await?;

        Ok(PreflightResponse {
            nonce: challenge_message(&nonce.value),
            user_exists: false,
        })
    }

    /// Log in with a signature over the active nonce and record the attempt
    pub async fn login(
        &self,
        address: &WalletAddress,
        signature: &str,
        wallet_type: i32,
        meta: RequestMeta,
    ) -> Result<LoginResponse, AuthError> {
        let result = self.login_pipeline(address, signature, wallet_type).await;

        let signature_valid = matches!(&result, Ok(response) if response.signature_valid);
        self.login_attempts.record(LoginAttempt {
            address: address.clone(),
            signature: signature.to_string(),
            signature_valid,
            req_host_addr: meta.host_addr,
            req_headers: meta.headers,
            created_at: Utc::now(),
        });

        result
    }

    async fn login_pipeline(
        &self,
        address: &WalletAddress,
        signature: &str,
        wallet_type: i32,
    ) -> Result<LoginResponse, AuthError> {
        let wallet_type = WalletType::try_from(wallet_type).map_err(SignatureError::from)?;
        let nonce = self.nonces.get(address).await?;
        let user = self
            .users
            .get_by_address(address)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let check = self
            .verifier
            .verify(signature, &nonce.value, address, wallet_type)
            .await?;

        if !check.is_valid() {
            tracing::info!(%address, user_id = %user.id, "Login signature rejected");
            return Ok(LoginResponse {
                signature_valid: false,
                jwt_token: None,
                user_id: None,
                address: address.clone(),
            });
        }

        let jwt_token = self.sessions.issue(user.id)?;
        self.rotate_nonce(address).await?;

        tracing::info!(%address, user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            signature_valid: true,
            jwt_token: Some(jwt_token),
            user_id: Some(user.id),
            address: address.clone(),
        })
    }

    /// Create a user owning the proven address
    pub async fn create_user(
        &self,
        proof: &AddressProofRequest,
    ) -> Result<CreateUserResponse, AuthError> {
        if !self.verify_unclaimed_address(proof).await? {
            return Ok(CreateUserResponse::default());
        }

        let user = self
            .users
            .create(User::new(vec![proof.address.clone()]))
            .await?;
        let jwt_token = self.sessions.issue(user.id)?;
        self.rotate_nonce(&proof.address).await?;

        tracing::info!(address = %proof.address, user_id = %user.id, "User created");

        Ok(CreateUserResponse {
            signature_valid: true,
            jwt_token: Some(jwt_token),
            user_id: Some(user.id),
        })
    }

    /// Link the proven address to an existing user
    pub async fn add_address(
        &self,
        user_id: Uuid,
        proof: &AddressProofRequest,
    ) -> Result<AddAddressResponse, AuthError> {
        if !self.verify_unclaimed_address(proof).await? {
            return Ok(AddAddressResponse::default());
        }

        self.users
            .add_addresses(user_id, std::slice::from_ref(&proof.address))
            .await?;
        self.rotate_nonce(&proof.address).await?;

        tracing::info!(address = %proof.address, %user_id, "Address linked to user");

        Ok(AddAddressResponse {
            signature_valid: true,
        })
    }

    /// Unlink addresses from a user, keeping at least one
    pub async fn remove_addresses(
        &self,
        user_id: Uuid,
        addresses: &[WalletAddress],
    ) -> Result<(), AuthError> {
        let user = self.users.get_by_id(user_id).await?;
        let remaining = user
            .addresses
            .iter()
            .filter(|address| !addresses.contains(address))
            .count();
        if remaining == 0 {
            return Err(AuthError::CannotRemoveAllAddresses);
        }

        self.users.remove_addresses(user_id, addresses).await?;
        Ok(())
    }

    /// Look a user up by ID, address or username, in that order
    pub async fn get_user(&self, query: &GetUserQuery) -> Result<User, AuthError> {
        let user = if let Some(id) = query.user_id {
            Some(self.users.get_by_id(id).await?)
        } else if let Some(address) = &query.address {
            self.users.get_by_address(address).await?
        } else if let Some(username) = &query.username {
            self.users.get_by_username(username).await?
        } else {
            None
        };

        user.ok_or(AuthError::UserNotFound)
    }

    /// Whether any address of the user holds a required token
    pub async fn user_has_required_tokens(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let user = self.users.get_by_id(user_id).await?;
        for address in &user.addresses {
            match self.owns_required_tokens(address).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(%address, error = %e, "Token ownership check failed");
                }
            }
        }
        Ok(false)
    }

    /// Shared precondition and signature check for creation and linking.
    ///
    /// Requires an active nonce and no current owner for the address.
    async fn verify_unclaimed_address(
        &self,
        proof: &AddressProofRequest,
    ) -> Result<bool, AuthError> {
        let wallet_type = WalletType::try_from(proof.wallet_type).map_err(SignatureError::from)?;
        let address = &proof.address;

        let nonce = self.nonces.get(address).await?;
        if self.users.get_by_address(address).await?.is_some() {
            return Err(AuthError::UserAlreadyExistsWithAddress(address.clone()));
        }

        // Contract wallets are checked on-chain against a hash, so make sure
        // the client signed the current challenge before calling out
        if wallet_type != WalletType::Eoa
            && proof.nonce.as_deref() != Some(challenge_message(&nonce.value).as_str())
        {
            return Err(AuthError::NonceMismatch);
        }

        let check = self
            .verifier
            .verify(&proof.signature, &nonce.value, address, wallet_type)
            .await?;
        if !check.is_valid() {
            tracing::info!(%address, "Address proof signature rejected");
        }
        Ok(check.is_valid())
    }

    async fn rotate_nonce(&self, address: &WalletAddress) -> Result<(), AuthError> {
        self.nonces
            .create(Nonce::new(address.clone(), generate_nonce()))
            .await?;
        Ok(())
    }

    async fn owns_required_tokens(&self, address: &WalletAddress) -> Result<bool, AuthError> {
        let tokens = &self.settings.required_tokens;
        let call = self
            .chain
            .owns_any_token(address.to_address(), tokens.contract, &tokens.token_ids);

        match tokio::time::timeout(self.settings.chain_call_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AuthError::Chain(ChainError::Timeout)),
        }
    }
}
