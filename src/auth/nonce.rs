//! Nonce generation and challenge messages

use rand::Rng;

/// Prepended to every nonce to form the message a wallet signs
pub const NONCE_PREFIX: &str = "Gallery uses this cryptographic signature in place of a password, verifying that you are the owner of this Ethereum address: ";

/// Fresh nonce value: a random `u64` rendered in decimal
pub fn generate_nonce() -> String {
    let value: u64 = rand::thread_rng().gen();
    value.to_string()
}

/// The challenge message for a nonce value
pub fn challenge_message(nonce_value: &str) -> String {
    format!("{NONCE_PREFIX}{nonce_value}")
}
