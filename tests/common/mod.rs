//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;

use gallery_backend::auth::{
    AuthChallengeService, AuthSettings, LoginAttemptRecorder, LoginAttemptWorker, SessionIssuer,
    EIP1271_MAGIC_VALUE,
};
use gallery_backend::chain::{ChainClient, ChainError, RequiredTokens};
use gallery_backend::models::{LoginAttempt, WalletAddress};
use gallery_backend::persist::{
    InMemoryLoginAttemptRepository, InMemoryNonceRepository, InMemoryUserRepository,
};

pub const JWT_SECRET: &str = "integration-test-secret";

/// Chain double with fixed answers
pub struct ScriptedChain {
    pub owns_tokens: Result<bool, String>,
    pub wallet_answer: Result<[u8; 4], String>,
    pub delay: Option<Duration>,
    pub ownership_calls: AtomicUsize,
}

impl ScriptedChain {
    /// Every address holds a required token; contract wallets reject
    pub fn holder() -> Self {
        Self {
            owns_tokens: Ok(true),
            wallet_answer: Ok([0; 4]),
            delay: None,
            ownership_calls: AtomicUsize::new(0),
        }
    }

    pub fn non_holder() -> Self {
        Self {
            owns_tokens: Ok(false),
            ..Self::holder()
        }
    }

    /// Contract wallets answer with the EIP-1271 magic value
    pub fn approving_wallet() -> Self {
        Self {
            wallet_answer: Ok(EIP1271_MAGIC_VALUE),
            ..Self::holder()
        }
    }

    pub fn unreachable_wallet() -> Self {
        Self {
            wallet_answer: Err("connection refused".to_string()),
            ..Self::holder()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::holder()
        }
    }

    pub fn ownership_calls(&self) -> usize {
        self.ownership_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn is_valid_signature(
        &self,
        _wallet: Address,
        _hash: B256,
        _signature: Bytes,
    ) -> Result<[u8; 4], ChainError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.wallet_answer.clone().map_err(ChainError::Rpc)
    }

    async fn owns_any_token(
        &self,
        _owner: Address,
        _contract: Address,
        _token_ids: &[U256],
    ) -> Result<bool, ChainError> {
        self.ownership_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.owns_tokens.clone().map_err(ChainError::Rpc)
    }
}

pub fn test_settings() -> AuthSettings {
    AuthSettings {
        required_tokens: RequiredTokens {
            contract: Address::repeat_byte(0x11),
            token_ids: vec![U256::from(1), U256::from(2)],
        },
        require_nft_for_registration: true,
        chain_call_timeout: Duration::from_millis(200),
    }
}

/// Auth service wired to in-memory stores
pub struct Harness {
    pub service: Arc<AuthChallengeService>,
    pub nonces: Arc<InMemoryNonceRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub attempts: Arc<InMemoryLoginAttemptRepository>,
    pub chain: Arc<ScriptedChain>,
    pub sessions: SessionIssuer,
    pub worker: LoginAttemptWorker,
}

impl Harness {
    pub fn new(chain: ScriptedChain) -> Self {
        Self::with_settings(chain, test_settings())
    }

    pub fn with_settings(chain: ScriptedChain, settings: AuthSettings) -> Self {
        let nonces = Arc::new(InMemoryNonceRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let attempts = Arc::new(InMemoryLoginAttemptRepository::new());
        let chain = Arc::new(chain);
        let sessions = SessionIssuer::new(JWT_SECRET.to_string(), 3600);

        let (recorder, worker) = LoginAttemptRecorder::spawn(attempts.clone(), 64);

        let service = Arc::new(AuthChallengeService::new(
            users.clone(),
            nonces.clone(),
            chain.clone(),
            sessions.clone(),
            recorder,
            settings,
        ));

        Self {
            service,
            nonces,
            users,
            attempts,
            chain,
            sessions,
            worker,
        }
    }

    /// Wait until the audit task has stored `count` attempts
    pub async fn wait_for_attempts(&self, count: usize) -> Vec<LoginAttempt> {
        for _ in 0..100 {
            let stored = self.attempts.attempts().await;
            if stored.len() >= count {
                return stored;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.attempts.attempts().await
    }
}

pub fn address_of(signer: &PrivateKeySigner) -> WalletAddress {
    WalletAddress::from(signer.address())
}

/// Sign the challenge the way wallets do for `personal_sign`
pub fn personal_sign(signer: &PrivateKeySigner, message: &str) -> String {
    let sig = signer.sign_message_sync(message.as_bytes()).unwrap();
    format!("0x{}", hex::encode(sig.as_bytes()))
}

/// Sign keccak256 of the bare challenge, without the envelope
pub fn raw_sign(signer: &PrivateKeySigner, message: &str) -> String {
    let sig = signer
        .sign_hash_sync(&keccak256(message.as_bytes()))
        .unwrap();
    format!("0x{}", hex::encode(sig.as_bytes()))
}
