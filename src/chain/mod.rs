//! On-chain reads used by authentication
//!
//! - EIP-1271 `isValidSignature` for contract wallets
//! - ERC-1155 `balanceOfBatch` for the registration gate

use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{sol, SolCall};
use alloy::transports::http::reqwest::Url;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

sol! {
    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4);
    function balanceOfBatch(address[] accounts, uint256[] ids) external view returns (uint256[]);
}

/// Chain access errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC call failed: {0}")]
    Rpc(String),

    #[error("Unexpected contract response: {0}")]
    Decode(String),

    #[error("On-chain call timed out")]
    Timeout,
}

/// Token set an unregistered address must hold at least one of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredTokens {
    pub contract: Address,
    pub token_ids: Vec<U256>,
}

/// Read-only view of the chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Calls `isValidSignature(hash, signature)` on `wallet` and returns the
    /// 4-byte selector it answers with.
    async fn is_valid_signature(
        &self,
        wallet: Address,
        hash: B256,
        signature: Bytes,
    ) -> Result<[u8; 4], ChainError>;

    /// True when `owner` has a non-zero balance of any of `token_ids`
    async fn owns_any_token(
        &self,
        owner: Address,
        contract: Address,
        token_ids: &[U256],
    ) -> Result<bool, ChainError>;
}

/// `ChainClient` over an HTTP JSON-RPC provider
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: DynProvider,
}

impl AlloyChainClient {
    pub fn connect(rpc_url: &str) -> Result<Self, ChainError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|_| ChainError::InvalidRpcUrl(rpc_url.to_string()))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }

    async fn call(&self, to: Address, input: Vec<u8>) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(Bytes::from(input));

        self.provider
            .call(tx)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn is_valid_signature(
        &self,
        wallet: Address,
        hash: B256,
        signature: Bytes,
    ) -> Result<[u8; 4], ChainError> {
        let call = isValidSignatureCall { hash, signature };
        let response = self.call(wallet, call.abi_encode()).await?;

        // bytes4 is left-aligned in its 32-byte word
        response
            .get(..4)
            .and_then(|selector| <[u8; 4]>::try_from(selector).ok())
            .ok_or_else(|| {
                ChainError::Decode(format!("isValidSignature returned {} bytes", response.len()))
            })
    }

    async fn owns_any_token(
        &self,
        owner: Address,
        contract: Address,
        token_ids: &[U256],
    ) -> Result<bool, ChainError> {
        if token_ids.is_empty() {
            return Ok(false);
        }

        let call = balanceOfBatchCall {
            accounts: vec![owner; token_ids.len()],
            ids: token_ids.to_vec(),
        };
        let response = self.call(contract, call.abi_encode()).await?;
        let balances = balanceOfBatchCall::abi_decode_returns(&response)
            .map_err(|e| ChainError::Decode(e.to_string()))?;

        Ok(balances.iter().any(|balance| !balance.is_zero()))
    }
}
