//! Cryptographic primitives for StarNotary
//!
//! Ownership proofs use recoverable ECDSA over secp256k1: the signer's
//! public key is recovered from the signature itself, so verification only
//! needs the wallet address and the challenge message.

use crate::error::{NotaryError, Result};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
/// This prevents repeated, unnecessary context creation.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Serialized signature layout: one recovery-id byte followed by the
/// 64-byte compact signature, hex-encoded.
const RECOVERABLE_SIGNATURE_SIZE: usize = COMPACT_SIGNATURE_SIZE + 1;

/// Wallet address derivation: hex SHA-256 of the compressed public key.
pub fn derive_address(public_key: &PublicKey) -> String {
    let pubkey_bytes: [u8; PUBLIC_KEY_SIZE] = public_key.serialize();
    hex::encode(Sha256::digest(pubkey_bytes))
}

fn challenge_digest(message: &str) -> Result<Message> {
    let digest = Sha256::digest(message.as_bytes());
    Message::from_digest_slice(&digest)
        .map_err(|e| NotaryError::Crypto(format!("Failed to create message: {}", e)))
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self> {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);

        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                NotaryError::Crypto(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                NotaryError::Crypto(format!("Invalid secret key bytes: {}", e))
            }
        })?;
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);

        Ok(KeyPair {
            secret_key,
            public_key,
        })
    }

    /// The wallet address owned by this key pair.
    pub fn address(&self) -> String {
        derive_address(&self.public_key)
    }

    /// Signs a challenge message (hashed with SHA-256 first) and returns the
    /// hex-encoded recoverable signature.
    pub fn sign_message(&self, message: &str) -> Result<String> {
        let message = challenge_digest(message)?;
        let signature = SECP256K1_CONTEXT.sign_ecdsa_recoverable(&message, &self.secret_key);

        let (recovery_id, compact) = signature.serialize_compact();
        let mut bytes = Vec::with_capacity(RECOVERABLE_SIGNATURE_SIZE);
        bytes.push(recovery_id.to_i32() as u8);
        bytes.extend_from_slice(&compact);
        Ok(hex::encode(bytes))
    }
}

/// Verifies that `signature_hex` is a valid signature over `message` made by
/// the key that owns `address`. Malformed signatures simply fail
/// verification; they are user input, not a crypto fault.
pub fn verify_address_signature(address: &str, message: &str, signature_hex: &str) -> bool {
    let bytes = match hex::decode(signature_hex) {
        Ok(bytes) if bytes.len() == RECOVERABLE_SIGNATURE_SIZE => bytes,
        _ => return false,
    };
    let recovery_id = match RecoveryId::from_i32(bytes[0] as i32) {
        Ok(id) => id,
        Err(_) => return false,
    };
    let signature = match RecoverableSignature::from_compact(&bytes[1..], recovery_id) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let message = match challenge_digest(message) {
        Ok(message) => message,
        Err(_) => return false,
    };

    match SECP256K1_CONTEXT.recover_ecdsa(&message, &signature) {
        Ok(public_key) => derive_address(&public_key) == address,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let keypair = KeyPair::generate().unwrap();
        assert_eq!(keypair.public_key.serialize().len(), PUBLIC_KEY_SIZE);
        assert_eq!(keypair.secret_key.as_ref().len(), SECRET_KEY_SIZE);
        // Address is a 32-byte SHA-256 hash, hex-encoded
        assert_eq!(keypair.address().len(), 64);
    }

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate().unwrap();
        let message = "a1:1541605128:starRegistry";

        let signature = keypair.sign_message(message).unwrap();
        assert_eq!(signature.len(), RECOVERABLE_SIGNATURE_SIZE * 2);
        assert!(verify_address_signature(&keypair.address(), message, &signature));
    }

    #[test]
    fn test_wrong_address_fails() {
        let keypair = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let message = "a1:1541605128:starRegistry";

        let signature = keypair.sign_message(message).unwrap();
        assert!(!verify_address_signature(&other.address(), message, &signature));
    }

    #[test]
    fn test_tampered_message_fails() {
        let keypair = KeyPair::generate().unwrap();
        let signature = keypair.sign_message("original challenge").unwrap();
        assert!(!verify_address_signature(
            &keypair.address(),
            "tampered challenge",
            &signature
        ));
    }

    #[test]
    fn test_malformed_signature_fails() {
        let keypair = KeyPair::generate().unwrap();
        let message = "a1:1541605128:starRegistry";

        assert!(!verify_address_signature(&keypair.address(), message, "not-hex"));
        assert!(!verify_address_signature(&keypair.address(), message, "abcd"));

        let mut signature = keypair.sign_message(message).unwrap();
        signature.truncate(signature.len() - 2);
        assert!(!verify_address_signature(&keypair.address(), message, &signature));
    }

    #[test]
    fn test_from_secret_bytes_invalid_length() {
        let short_bytes = [0u8; SECRET_KEY_SIZE - 1];
        let result = KeyPair::from_secret_bytes(&short_bytes);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Secret key must be"));
    }
}
