//! Data models for the gallery backend

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Returned when a string is not a `0x`-prefixed 20-byte hex address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid wallet address: {0}")]
pub struct InvalidAddress(pub String);

/// Ethereum wallet address, always stored lowercase with the `0x` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parsed form used for on-chain calls
    pub fn to_address(&self) -> Address {
        // The inner string was validated on construction
        Address::from_str(&self.0).unwrap_or(Address::ZERO)
    }

    /// Case-insensitive comparison against another hex address
    pub fn matches(&self, other: &Address) -> bool {
        self.to_address() == *other
    }
}

impl FromStr for WalletAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 42 || !trimmed.starts_with("0x") {
            return Err(InvalidAddress(s.to_string()));
        }
        let address = Address::from_str(trimmed).map_err(|_| InvalidAddress(s.to_string()))?;
        Ok(Self::from(address))
    }
}

impl From<Address> for WalletAddress {
    fn from(address: Address) -> Self {
        Self(format!("0x{}", hex::encode(address.as_slice())))
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = InvalidAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of wallet behind an address; selects the verification algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalletType {
    /// Externally owned account, controlled by a private key
    #[default]
    Eoa,
    /// Smart-contract wallet implementing EIP-1271 (e.g. Gnosis Safe)
    ContractWallet,
}

impl WalletType {
    pub fn as_i32(&self) -> i32 {
        match self {
            WalletType::Eoa => 0,
            WalletType::ContractWallet => 1,
        }
    }
}

/// Returned when a request names a wallet type this backend cannot verify
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Wallet type not supported: {0}")]
pub struct UnsupportedWalletType(pub i32);

impl TryFrom<i32> for WalletType {
    type Error = UnsupportedWalletType;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WalletType::Eoa),
            1 => Ok(WalletType::ContractWallet),
            other => Err(UnsupportedWalletType(other)),
        }
    }
}

/// Gallery user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub addresses: Vec<WalletAddress>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(addresses: Vec<WalletAddress>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: None,
            bio: None,
            addresses,
            created_at: Utc::now(),
        }
    }

    pub fn owns(&self, address: &WalletAddress) -> bool {
        self.addresses.contains(address)
    }
}

/// Outstanding authentication nonce for an address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nonce {
    pub address: WalletAddress,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl Nonce {
    pub fn new(address: WalletAddress, value: String) -> Self {
        Self {
            address,
            value,
            created_at: Utc::now(),
        }
    }
}

/// Audit record written once per login attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub address: WalletAddress,
    pub signature: String,
    pub signature_valid: bool,
    pub req_host_addr: Option<String>,
    pub req_headers: BTreeMap<String, Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Serialize, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub addresses: Vec<WalletAddress>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            bio: user.bio,
            addresses: user.addresses,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_is_lowercased() {
        let address: WalletAddress = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap();
        assert_eq!(address.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_wallet_address_rejects_malformed_input() {
        assert!("abcdef0123456789abcdef0123456789abcdef01".parse::<WalletAddress>().is_err());
        assert!("0x1234".parse::<WalletAddress>().is_err());
        assert!("0xzzcdef0123456789abcdef0123456789abcdef01"
            .parse::<WalletAddress>()
            .is_err());
    }

    #[test]
    fn test_wallet_address_deserializes_from_json() {
        let parsed: WalletAddress =
            serde_json::from_str("\"0xABCDEF0123456789ABCDEF0123456789ABCDEF01\"").unwrap();
        assert_eq!(parsed.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
        assert!(serde_json::from_str::<WalletAddress>("\"nope\"").is_err());
    }

    #[test]
    fn test_wallet_type_from_i32() {
        assert_eq!(WalletType::try_from(0).unwrap(), WalletType::Eoa);
        assert_eq!(WalletType::try_from(1).unwrap(), WalletType::ContractWallet);
        assert_eq!(WalletType::try_from(7), Err(UnsupportedWalletType(7)));
        assert_eq!(WalletType::default(), WalletType::Eoa);
    }
}
