//! SECP256K1 key handling and address derivation.
//!
//! Addresses are the base58-check encoding (version byte 0) of the
//! RIPEMD160-over-SHA256 hash of the compressed public key. Seed-derived
//! keys are deterministic: the same seed phrase always yields the same
//! private key.

use ripemd::Ripemd160;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};
use sha2::Digest;

use crate::{constants, sha256, Hash};

/// Key parsing failures.
#[derive(Clone, Debug, thiserror::Error)]
pub enum KeyError {
    #[error("malformed key encoding")]
    Encoding,
    #[error("invalid secp256k1 private key")]
    InvalidPrivateKey,
}

/// Generate a fresh random private key.
pub fn generate_privkey() -> SecretKey {
    use rand::RngCore;
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Ok(sk) = SecretKey::from_slice(&bytes) {
            return sk;
        }
    }
}

/// Parse a private key from raw bytes.
pub fn privkey_from_bytes(bytes: &[u8]) -> Result<SecretKey, KeyError> {
    SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)
}

/// Parse a private key from its hex encoding.
pub fn privkey_from_hex(hex_str: &str) -> Result<SecretKey, KeyError> {
    let bytes = hex::decode(hex_str).map_err(|_| KeyError::Encoding)?;
    privkey_from_bytes(&bytes)
}

/// Deterministically derive the wallet's private key from a seed phrase.
///
/// SHA-256 of the canonical phrase, re-hashed in the (cryptographically
/// negligible) case the digest is not a valid scalar.
pub fn privkey_from_seed(seed: &str) -> SecretKey {
    let mut digest = sha256(seed.as_bytes());
    loop {
        if let Ok(sk) = SecretKey::from_slice(&digest) {
            return sk;
        }
        digest = sha256(&digest);
    }
}

/// Compressed public key bytes (33 bytes) for a private key.
pub fn pubkey_bytes(privkey: &SecretKey) -> Vec<u8> {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, privkey)
        .serialize()
        .to_vec()
}

/// Derive the on-chain address for a serialized public key.
pub fn pubkey_to_address(pubkey: &[u8]) -> String {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(pubkey));
    let hash160 = ripemd.finalize();
    bs58::encode(hash160.as_slice())
        .with_check_version(constants::ADDRESS_VERSION)
        .into_string()
}

/// Address owned by a private key.
pub fn privkey_to_address(privkey: &SecretKey) -> String {
    pubkey_to_address(&pubkey_bytes(privkey))
}

/// Sign a 32-byte digest, returning `(compressed pubkey, compact signature)`.
pub fn sign_digest(privkey: &SecretKey, digest: &Hash) -> (Vec<u8>, Vec<u8>) {
    let secp = Secp256k1::new();
    let msg = Message::from_digest(*digest);
    let sig = secp.sign_ecdsa(&msg, privkey);
    let pubkey = PublicKey::from_secret_key(&secp, privkey);
    (pubkey.serialize().to_vec(), sig.serialize_compact().to_vec())
}

/// Verify a compact signature over a 32-byte digest.
pub fn verify_digest(pubkey: &[u8], digest: &Hash, signature: &[u8]) -> bool {
    let secp = Secp256k1::new();
    let Ok(pk) = PublicKey::from_slice(pubkey) else {
        return false;
    };
    let Ok(sig) = ecdsa::Signature::from_compact(signature) else {
        return false;
    };
    let msg = Message::from_digest(*digest);
    secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
}
