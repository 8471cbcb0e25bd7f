//! Wallet signature verification
//!
//! Decides whether a signature over the challenge message proves control of
//! an address. Externally owned accounts are checked by ECDSA public key
//! recovery; contract wallets by an EIP-1271 `isValidSignature` call.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;

use super::nonce::challenge_message;
use crate::chain::ChainClient;
use crate::models::{UnsupportedWalletType, WalletAddress, WalletType};

/// Return value of a successful EIP-1271 `isValidSignature` call
pub const EIP1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

const PERSONAL_SIGN_HEADER: &str = "\x19Ethereum Signed Message:\n";

/// Errors for signatures that cannot be checked at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Invalid signature recovery id: {0}")]
    InvalidSignatureRecoveryId(u8),

    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(String),

    #[error(transparent)]
    UnsupportedWalletType(#[from] UnsupportedWalletType),
}

/// Outcome of a verification that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// The signature is well formed but was produced by another key
    AddressMismatch { recovered: Address },
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Valid)
    }
}

/// How the challenge message is turned into signed bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEncoding {
    /// `personal_sign`: "\x19Ethereum Signed Message:\n" + len + message
    PersonalSign,
    /// `eth_sign` over the bare message
    Raw,
}

impl MessageEncoding {
    /// Tried in this order; the first success wins
    pub const ALL: [MessageEncoding; 2] = [MessageEncoding::PersonalSign, MessageEncoding::Raw];

    pub fn encode(&self, message: &str) -> Vec<u8> {
        match self {
            MessageEncoding::PersonalSign => {
                format!("{PERSONAL_SIGN_HEADER}{}{message}", message.len()).into_bytes()
            }
            MessageEncoding::Raw => message.as_bytes().to_vec(),
        }
    }
}

/// Verifies challenge signatures for every supported wallet type
#[derive(Clone)]
pub struct SignatureVerifier {
    chain: Arc<dyn ChainClient>,
    call_timeout: Duration,
}

impl SignatureVerifier {
    pub fn new(chain: Arc<dyn ChainClient>, call_timeout: Duration) -> Self {
        Self {
            chain,
            call_timeout,
        }
    }

    /// Verify `signature` over the challenge for `nonce_value`.
    ///
    /// Both message encodings are tried. A mismatch or "not valid" answer is
    /// an `Ok` outcome; only signatures that cannot be parsed or recovered
    /// produce an error, and only when the last encoding tried also failed.
    pub async fn verify(
        &self,
        signature: &str,
        nonce_value: &str,
        address: &WalletAddress,
        wallet_type: WalletType,
    ) -> Result<SignatureCheck, SignatureError> {
        let message = challenge_message(nonce_value);

        let mut outcome = Ok(SignatureCheck::Invalid);
        for encoding in MessageEncoding::ALL {
            let encoded = encoding.encode(&message);
            outcome = match wallet_type {
                WalletType::Eoa => verify_eoa(signature, &encoded, address),
                WalletType::ContractWallet => {
                    Ok(self.verify_contract_wallet(&encoded, address).await)
                }
            };

            if matches!(outcome, Ok(SignatureCheck::Valid)) {
                tracing::debug!(%address, ?encoding, ?wallet_type, "Signature verified");
                return outcome;
            }
        }

        if let Ok(SignatureCheck::AddressMismatch { recovered }) = &outcome {
            tracing::debug!(%address, %recovered, "Address does not match signature");
        }
        outcome
    }

    async fn verify_contract_wallet(
        &self,
        encoded: &[u8],
        address: &WalletAddress,
    ) -> SignatureCheck {
        let hash: B256 = keccak256(encoded);
        let call = self
            .chain
            .is_valid_signature(address.to_address(), hash, Bytes::new());

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) if value == EIP1271_MAGIC_VALUE => SignatureCheck::Valid,
            Ok(Ok(value)) => {
                tracing::debug!(%address, value = %hex::encode(value), "isValidSignature rejected hash");
                SignatureCheck::Invalid
            }
            Ok(Err(e)) => {
                tracing::warn!(%address, error = %e, "isValidSignature call failed");
                SignatureCheck::Invalid
            }
            Err(_) => {
                tracing::warn!(%address, timeout_ms = %self.call_timeout.as_millis(), "isValidSignature call timed out");
                SignatureCheck::Invalid
            }
        }
    }
}

/// ECDSA recovery check for externally owned accounts
fn verify_eoa(
    signature: &str,
    encoded: &[u8],
    address: &WalletAddress,
) -> Result<SignatureCheck, SignatureError> {
    let hash = keccak256(encoded);
    let mut sig = decode_signature(signature)?;

    // Ledger and other hardware wallets produce v = 0 or 1
    if sig[64] == 0 || sig[64] == 1 {
        sig[64] += 27;
    }
    let v = sig[64];
    if v != 27 && v != 28 {
        return Err(SignatureError::InvalidSignatureRecoveryId(v));
    }
    let recovery_id =
        RecoveryId::from_byte(v - 27).ok_or(SignatureError::InvalidSignatureRecoveryId(v))?;

    let ecdsa_sig = Signature::from_slice(&sig[..64])
        .map_err(|e| SignatureError::InvalidSignatureFormat(e.to_string()))?;

    // Malleated (high-S) twins of a real signature never verify
    if ecdsa_sig.normalize_s().is_some() {
        tracing::debug!(%address, "Rejecting high-S signature");
        return Ok(SignatureCheck::Invalid);
    }

    let recovered_key = VerifyingKey::recover_from_prehash(hash.as_slice(), &ecdsa_sig, recovery_id)
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))?;

    let recovered = Address::from_public_key(&recovered_key);
    if !address.matches(&recovered) {
        return Ok(SignatureCheck::AddressMismatch { recovered });
    }

    // Check the signature once more against the compressed key
    let compressed = recovered_key.to_encoded_point(true);
    let key = VerifyingKey::from_sec1_bytes(compressed.as_bytes())
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))?;

    Ok(match key.verify_prehash(hash.as_slice(), &ecdsa_sig) {
        Ok(()) => SignatureCheck::Valid,
        Err(_) => SignatureCheck::Invalid,
    })
}

/// Decode a hex signature (with or without `0x`) into its 65 raw bytes
fn decode_signature(signature: &str) -> Result<[u8; 65], SignatureError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes =
        hex::decode(hex_part).map_err(|e| SignatureError::InvalidSignatureFormat(e.to_string()))?;

    <[u8; 65]>::try_from(bytes.as_slice()).map_err(|_| {
        SignatureError::InvalidSignatureFormat(format!("expected 65 bytes, got {}", bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers `isValidSignature` with a fixed result and records hashes
    struct ScriptedWallet {
        answer: Result<[u8; 4], String>,
        accept_only: Option<B256>,
        delay: Option<Duration>,
        seen: Mutex<Vec<B256>>,
    }

    impl ScriptedWallet {
        fn answering(answer: Result<[u8; 4], String>) -> Self {
            Self {
                answer,
                accept_only: None,
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChainClient for ScriptedWallet {
        async fn is_valid_signature(
            &self,
            _wallet: Address,
            hash: B256,
            signature: Bytes,
        ) -> Result<[u8; 4], ChainError> {
            assert!(signature.is_empty());
            self.seen.lock().unwrap().push(hash);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(expected) = self.accept_only {
                if expected != hash {
                    return Ok([0; 4]);
                }
            }
            self.answer.clone().map_err(ChainError::Rpc)
        }

        async fn owns_any_token(
            &self,
            _owner: Address,
            _contract: Address,
            _token_ids: &[U256],
        ) -> Result<bool, ChainError> {
            Ok(false)
        }
    }

    fn verifier_with(chain: ScriptedWallet) -> (SignatureVerifier, Arc<ScriptedWallet>) {
        let chain = Arc::new(chain);
        (
            SignatureVerifier::new(chain.clone(), Duration::from_millis(200)),
            chain,
        )
    }

    fn eoa_verifier() -> SignatureVerifier {
        verifier_with(ScriptedWallet::answering(Err("unused".into()))).0
    }

    fn address_of(signer: &PrivateKeySigner) -> WalletAddress {
        WalletAddress::from(signer.address())
    }

    fn personal_sign(signer: &PrivateKeySigner, nonce: &str) -> String {
        let sig = signer
            .sign_message_sync(challenge_message(nonce).as_bytes())
            .unwrap();
        format!("0x{}", hex::encode(sig.as_bytes()))
    }

    fn raw_sign(signer: &PrivateKeySigner, nonce: &str) -> String {
        let hash = keccak256(challenge_message(nonce).as_bytes());
        let sig = signer.sign_hash_sync(&hash).unwrap();
        format!("0x{}", hex::encode(sig.as_bytes()))
    }

    #[test]
    fn test_personal_sign_encoding() {
        let encoded = MessageEncoding::PersonalSign.encode("hello");
        assert_eq!(encoded, b"\x19Ethereum Signed Message:\n5hello".to_vec());
        assert_eq!(MessageEncoding::Raw.encode("hello"), b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_eoa_personal_sign_is_valid() {
        let signer = PrivateKeySigner::random();
        let signature = personal_sign(&signer, "12345");

        let check = eoa_verifier()
            .verify(&signature, "12345", &address_of(&signer), WalletType::Eoa)
            .await
            .unwrap();
        assert_eq!(check, SignatureCheck::Valid);
    }

    #[tokio::test]
    async fn test_eoa_raw_sign_is_valid() {
        let signer = PrivateKeySigner::random();
        let signature = raw_sign(&signer, "777");

        let check = eoa_verifier()
            .verify(&signature, "777", &address_of(&signer), WalletType::Eoa)
            .await
            .unwrap();
        assert!(check.is_valid());
    }

    #[tokio::test]
    async fn test_eoa_hardware_wallet_recovery_id() {
        let signer = PrivateKeySigner::random();
        let sig = signer
            .sign_message_sync(challenge_message("9").as_bytes())
            .unwrap();
        let mut bytes = sig.as_bytes();
        bytes[64] -= 27;
        let signature = hex::encode(bytes);

        let check = eoa_verifier()
            .verify(&signature, "9", &address_of(&signer), WalletType::Eoa)
            .await
            .unwrap();
        assert!(check.is_valid());
    }

    #[tokio::test]
    async fn test_eoa_other_signer_is_mismatch() {
        let claimed = PrivateKeySigner::random();
        let actual = PrivateKeySigner::random();
        let signature = personal_sign(&actual, "1");

        let check = eoa_verifier()
            .verify(&signature, "1", &address_of(&claimed), WalletType::Eoa)
            .await
            .unwrap();
        match check {
            SignatureCheck::AddressMismatch { recovered } => {
                assert_ne!(recovered, claimed.address());
            }
            other => panic!("expected address mismatch, got {other:?}"),
        }
        assert!(!check.is_valid());
    }

    #[tokio::test]
    async fn test_eoa_signature_for_other_nonce_is_not_valid() {
        let signer = PrivateKeySigner::random();
        let signature = personal_sign(&signer, "100");

        let check = eoa_verifier()
            .verify(&signature, "101", &address_of(&signer), WalletType::Eoa)
            .await
            .unwrap();
        assert!(!check.is_valid());
    }

    #[tokio::test]
    async fn test_eoa_bad_recovery_id() {
        let signer = PrivateKeySigner::random();
        let sig = signer.sign_message_sync(b"x").unwrap();
        let mut bytes = sig.as_bytes();
        bytes[64] = 5;

        let err = eoa_verifier()
            .verify(&hex::encode(bytes), "1", &address_of(&signer), WalletType::Eoa)
            .await
            .unwrap_err();
        assert_eq!(err, SignatureError::InvalidSignatureRecoveryId(5));
    }

    #[tokio::test]
    async fn test_eoa_high_s_twin_is_invalid() {
        let signer = PrivateKeySigner::random();
        let sig = signer
            .sign_message_sync(challenge_message("42").as_bytes())
            .unwrap();
        let mut bytes = sig.as_bytes();

        // (r, n - s, v ^ 1) recovers the same key but is not canonical
        let order = U256::from_str_radix(
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
            16,
        )
        .unwrap();
        let s = U256::from_be_slice(&bytes[32..64]);
        bytes[32..64].copy_from_slice(&(order - s).to_be_bytes::<32>());
        bytes[64] = if bytes[64] == 27 { 28 } else { 27 };

        let check = eoa_verifier()
            .verify(&hex::encode(bytes), "42", &address_of(&signer), WalletType::Eoa)
            .await
            .unwrap();
        assert_eq!(check, SignatureCheck::Invalid);
    }

    #[tokio::test]
    async fn test_eoa_malformed_signature() {
        let signer = PrivateKeySigner::random();
        let verifier = eoa_verifier();

        for bad in ["0xzz", "0x1234", ""] {
            let err = verifier
                .verify(bad, "1", &address_of(&signer), WalletType::Eoa)
                .await
                .unwrap_err();
            assert!(matches!(err, SignatureError::InvalidSignatureFormat(_)));
        }
    }

    #[tokio::test]
    async fn test_contract_wallet_magic_value_is_valid() {
        let (verifier, chain) = verifier_with(ScriptedWallet::answering(Ok(EIP1271_MAGIC_VALUE)));
        let address = address_of(&PrivateKeySigner::random());

        let check = verifier
            .verify("0x", "5", &address, WalletType::ContractWallet)
            .await
            .unwrap();
        assert!(check.is_valid());

        let expected = keccak256(MessageEncoding::PersonalSign.encode(&challenge_message("5")));
        assert_eq!(chain.seen.lock().unwrap().as_slice(), &[expected]);
    }

    #[tokio::test]
    async fn test_contract_wallet_falls_back_to_raw_hash() {
        let raw_hash = keccak256(MessageEncoding::Raw.encode(&challenge_message("5")));
        let mut wallet = ScriptedWallet::answering(Ok(EIP1271_MAGIC_VALUE));
        wallet.accept_only = Some(raw_hash);
        let (verifier, chain) = verifier_with(wallet);
        let address = address_of(&PrivateKeySigner::random());

        let check = verifier
            .verify("0x", "5", &address, WalletType::ContractWallet)
            .await
            .unwrap();
        assert!(check.is_valid());
        assert_eq!(chain.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_contract_wallet_other_value_is_invalid() {
        let (verifier, _) = verifier_with(ScriptedWallet::answering(Ok([0xff, 0xff, 0xff, 0xff])));
        let address = address_of(&PrivateKeySigner::random());

        let check = verifier
            .verify("0x", "5", &address, WalletType::ContractWallet)
            .await
            .unwrap();
        assert_eq!(check, SignatureCheck::Invalid);
    }

    #[tokio::test]
    async fn test_contract_wallet_rpc_error_is_invalid() {
        let (verifier, _) =
            verifier_with(ScriptedWallet::answering(Err("execution reverted".into())));
        let address = address_of(&PrivateKeySigner::random());

        let check = verifier
            .verify("0x", "5", &address, WalletType::ContractWallet)
            .await
            .unwrap();
        assert_eq!(check, SignatureCheck::Invalid);
    }

    #[tokio::test]
    async fn test_contract_wallet_timeout_is_invalid() {
        let mut wallet = ScriptedWallet::answering(Ok(EIP1271_MAGIC_VALUE));
        wallet.delay = Some(Duration::from_secs(5));
        let (verifier, _) = verifier_with(wallet);
        let address = address_of(&PrivateKeySigner::random());

        let check = verifier
            .verify("0x", "5", &address, WalletType::ContractWallet)
            .await
            .unwrap();
        assert_eq!(check, SignatureCheck::Invalid);
    }
}
