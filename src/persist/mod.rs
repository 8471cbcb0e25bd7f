//! Persistence layer
//!
//! Repository traits consumed by the auth core, with a Postgres
//! implementation for deployments and an in-memory one for tests and
//! local runs.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{LoginAttempt, Nonce, User, WalletAddress};

pub mod inmem;
pub mod postgres;

pub use inmem::{InMemoryLoginAttemptRepository, InMemoryNonceRepository, InMemoryUserRepository};
pub use postgres::{PgLoginAttemptRepository, PgNonceRepository, PgUserRepository};

/// Repository errors
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No nonce found for address: {0}")]
    NonceNotFoundForAddress(WalletAddress),

    #[error("User not found")]
    UserNotFound,

    #[error("Address already owned by another user: {0}")]
    AddressAlreadyOwned(WalletAddress),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

/// Storage for authentication nonces.
///
/// Rotation is an insert: `create` never deletes the previous value, and
/// `get` must always return the most recently created nonce for the address.
#[async_trait]
pub trait NonceRepository: Send + Sync {
    async fn get(&self, address: &WalletAddress) -> Result<Nonce, PersistError>;

    async fn create(&self, nonce: Nonce) -> Result<Nonce, PersistError>;
}

/// Storage for users and their address ownership
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, PersistError>;

    async fn get_by_id(&self, id: Uuid) -> Result<User, PersistError>;

    async fn get_by_address(&self, address: &WalletAddress) -> Result<Option<User>, PersistError>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, PersistError>;

    async fn add_addresses(
        &self,
        user_id: Uuid,
        addresses: &[WalletAddress],
    ) -> Result<(), PersistError>;

    async fn remove_addresses(
        &self,
        user_id: Uuid,
        addresses: &[WalletAddress],
    ) -> Result<(), PersistError>;
}

/// Append-only audit log of login attempts
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync {
    async fn create(&self, attempt: LoginAttempt) -> Result<Uuid, PersistError>;
}
