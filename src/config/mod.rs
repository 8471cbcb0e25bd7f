//! Configuration management for the gallery backend
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::auth::AuthSettings;
use crate::chain::RequiredTokens;

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Database connection URL
    pub database_url: String,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for session token signing
    pub jwt_secret: String,

    /// Session token TTL in seconds (default: 1209600 = 14 days)
    pub jwt_ttl_seconds: i64,

    /// Ethereum JSON-RPC endpoint
    pub eth_rpc_url: String,

    /// ERC-1155 contract holding the membership tokens
    pub contract_address: Address,

    /// Token IDs of which an unregistered address must hold at least one
    pub required_token_ids: Vec<U256>,

    /// Gate registration on token ownership
    pub require_nft: bool,

    /// Bound for a single on-chain read
    pub chain_call_timeout_seconds: u64,

    /// Deadline for a whole HTTP request
    pub request_timeout_seconds: u64,

    /// Capacity of the login-attempt audit queue
    pub login_attempt_queue_size: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = lookup("ENVIRONMENT")
            .map(|s| s.parse::<Environment>())
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = var_or("PORT", "4000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = var_or("DB_MAX_CONNECTIONS", "5").parse::<u32>().unwrap_or(5);

        let log_level = var_or("RUST_LOG", "info");

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let jwt_ttl_seconds = var_or("JWT_TTL_SECONDS", "1209600")
            .parse::<i64>()
            .unwrap_or(1_209_600);

        let eth_rpc_url = var_or("ETH_RPC_URL", "http://localhost:8545");

        let contract_address = match lookup("CONTRACT_ADDRESS") {
            Some(raw) => Address::from_str(raw.trim()).map_err(|_| {
                ConfigError::InvalidValue(format!("CONTRACT_ADDRESS is not an address: '{}'", raw))
            })?,
            None => Address::ZERO,
        };

        let required_token_ids = parse_token_ids(&var_or("REQUIRED_NFTS", ""))?;

        let require_nft = match var_or("REQUIRE_NFT", "true").to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "REQUIRE_NFT must be true or false, got '{}'",
                    other
                )))
            }
        };

        let chain_call_timeout_seconds = var_or("CHAIN_CALL_TIMEOUT_SECONDS", "10")
            .parse::<u64>()
            .unwrap_or(10);

        let request_timeout_seconds = var_or("REQUEST_TIMEOUT_SECONDS", "30")
            .parse::<u64>()
            .unwrap_or(30);

        let login_attempt_queue_size = var_or("LOGIN_ATTEMPT_QUEUE_SIZE", "1024")
            .parse::<usize>()
            .unwrap_or(1024);

        Ok(Config {
            environment,
            database_url,
            port,
            db_max_connections,
            log_level,
            jwt_secret,
            jwt_ttl_seconds,
            eth_rpc_url,
            contract_address,
            required_token_ids,
            require_nft,
            chain_call_timeout_seconds,
            request_timeout_seconds,
            login_attempt_queue_size,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Settings consumed by the authentication service
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            required_tokens: RequiredTokens {
                contract: self.contract_address,
                token_ids: self.required_token_ids.clone(),
            },
            require_nft_for_registration: self.require_nft,
            chain_call_timeout: Duration::from_secs(self.chain_call_timeout_seconds),
        }
    }
}

/// Parse a comma-separated list of decimal token IDs
fn parse_token_ids(raw: &str) -> Result<Vec<U256>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            U256::from_str_radix(id, 10).map_err(|_| {
                ConfigError::InvalidValue(format!("REQUIRED_NFTS contains a bad token id: '{}'", id))
            })
        })
        .collect()
}
