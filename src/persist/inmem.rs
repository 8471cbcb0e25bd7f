//! In-memory repositories

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LoginAttemptRepository, NonceRepository, PersistError, UserRepository};
use crate::models::{LoginAttempt, Nonce, User, WalletAddress};

/// Nonces kept per address in insertion order; the last entry is active
#[derive(Default)]
pub struct InMemoryNonceRepository {
    nonces: RwLock<HashMap<WalletAddress, Vec<Nonce>>>,
}

impl InMemoryNonceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nonces ever created for an address
    pub async fn history_len(&self, address: &WalletAddress) -> usize {
        self.nonces
            .read()
            .await
            .get(address)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl NonceRepository for InMemoryNonceRepository {
    async fn get(&self, address: &WalletAddress) -> Result<Nonce, PersistError> {
        self.nonces
            .read()
            .await
            .get(address)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| PersistError::NonceNotFoundForAddress(address.clone()))
    }

    async fn create(&self, nonce: Nonce) -> Result<Nonce, PersistError> {
        self.nonces
            .write()
            .await
            .entry(nonce.address.clone())
            .or_default()
            .push(nonce.clone());
        Ok(nonce)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, PersistError> {
        let mut users = self.users.write().await;
        if let Some(taken) = user
            .addresses
            .iter()
            .find(|address| users.values().any(|existing| existing.owns(address)))
        {
            return Err(PersistError::AddressAlreadyOwned(taken.clone()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, PersistError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(PersistError::UserNotFound)
    }

    async fn get_by_address(&self, address: &WalletAddress) -> Result<Option<User>, PersistError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.owns(address))
            .cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, PersistError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| {
                user.username
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(username))
            })
            .cloned())
    }

    async fn add_addresses(
        &self,
        user_id: Uuid,
        addresses: &[WalletAddress],
    ) -> Result<(), PersistError> {
        let mut users = self.users.write().await;
        for address in addresses {
            if users
                .values()
                .any(|user| user.id != user_id && user.owns(address))
            {
                return Err(PersistError::AddressAlreadyOwned(address.clone()));
            }
        }

        let user = users.get_mut(&user_id).ok_or(PersistError::UserNotFound)?;
        for address in addresses {
            if !user.owns(address) {
                user.addresses.push(address.clone());
            }
        }
        Ok(())
    }

    async fn remove_addresses(
        &self,
        user_id: Uuid,
        addresses: &[WalletAddress],
    ) -> Result<(), PersistError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or(PersistError::UserNotFound)?;
        user.addresses.retain(|address| !addresses.contains(address));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLoginAttemptRepository {
    attempts: RwLock<Vec<LoginAttempt>>,
}

impl InMemoryLoginAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attempts(&self) -> Vec<LoginAttempt> {
        self.attempts.read().await.clone()
    }
}

#[async_trait]
impl LoginAttemptRepository for InMemoryLoginAttemptRepository {
    async fn create(&self, attempt: LoginAttempt) -> Result<Uuid, PersistError> {
        self.attempts.write().await.push(attempt);
        Ok(Uuid::new_v4())
    }
}
