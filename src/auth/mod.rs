//! Wallet authentication
//!
//! Nonce challenges, signature verification for plain and contract wallets,
//! session tokens and the login audit trail.

pub mod jwt;
pub mod login_attempts;
pub mod nonce;
pub mod service;
pub mod signature;

pub use jwt::{Claims, JwtError, SessionIssuer};
pub use login_attempts::{LoginAttemptRecorder, LoginAttemptWorker, RequestMeta};
pub use nonce::{challenge_message, generate_nonce, NONCE_PREFIX};
pub use service::{AuthChallengeService, AuthError, AuthSettings};
pub use signature::{
    MessageEncoding, SignatureCheck, SignatureError, SignatureVerifier, EIP1271_MAGIC_VALUE,
};
