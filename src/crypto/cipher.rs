//! Password-bound encryption of wallet secrets.
//!
//! The password-to-key transform is fixed for compatibility with existing
//! wallet databases: the UTF-8 password bytes are truncated to 32 bytes or
//! zero-padded on the right, and used directly as the AES-256 key; the IV
//! is the first 16 bytes of that key. This is deliberately not a KDF — no
//! salt, no stretching — and must not be changed without a versioned
//! format migration.
//!
//! Two wrapping modes are provided:
//! - [`encrypt_raw`]/[`decrypt_raw`] — CBC without padding, for 32-byte
//!   private keys. Ciphertext length equals plaintext length.
//! - [`encrypt_text`]/[`decrypt_text`] — CBC with PKCS#7, for the mnemonic
//!   seed whose UTF-8 length is not block-aligned.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use subtle::ConstantTimeEq;

use crate::{sha256, Hash};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Cipher failures.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CipherError {
    #[error("plaintext length {0} is not a multiple of the block size")]
    BlockLength(usize),
    #[error("decryption produced an invalid padding")]
    Padding,
}

/// Derive the fixed AES-256 key from a wallet password.
///
/// Truncates to the first 32 bytes when longer, zero-pads on the right when
/// shorter. Bit-exact with existing wallet databases.
pub fn password_key(password: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    let bytes = password.as_bytes();
    if bytes.len() > 32 {
        key.copy_from_slice(&bytes[..32]);
    } else {
        key[..bytes.len()].copy_from_slice(bytes);
    }
    key
}

fn cbc_pair(password: &str) -> ([u8; 32], [u8; 16]) {
    let key = password_key(password);
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&key[..16]);
    (key, iv)
}

/// Encrypt block-aligned key material under the wallet password.
pub fn encrypt_raw(password: &str, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    if plaintext.is_empty() || plaintext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::BlockLength(plaintext.len()));
    }
    let (key, iv) = cbc_pair(password);
    let enc = Aes256CbcEnc::new(&key.into(), &iv.into());
    Ok(enc.encrypt_padded_vec_mut::<NoPadding>(plaintext))
}

/// Decrypt block-aligned key material. The inverse of [`encrypt_raw`] for
/// any password and any block-aligned input.
pub fn decrypt_raw(password: &str, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::BlockLength(ciphertext.len()));
    }
    let (key, iv) = cbc_pair(password);
    let dec = Aes256CbcDec::new(&key.into(), &iv.into());
    dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CipherError::Padding)
}

/// Encrypt arbitrary-length UTF-8 (the seed phrase) under the password.
pub fn encrypt_text(password: &str, plaintext: &[u8]) -> Vec<u8> {
    let (key, iv) = cbc_pair(password);
    let enc = Aes256CbcEnc::new(&key.into(), &iv.into());
    enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt [`encrypt_text`] output. A wrong password surfaces as a padding
/// error rather than garbage plaintext.
pub fn decrypt_text(password: &str, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::BlockLength(ciphertext.len()));
    }
    let (key, iv) = cbc_pair(password);
    let dec = Aes256CbcDec::new(&key.into(), &iv.into());
    dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::Padding)
}

/// Hash a password for at-rest verification.
pub fn password_hash(password: &str) -> Hash {
    sha256(password.as_bytes())
}

/// Constant-time comparison of a candidate password against a stored hash.
pub fn verify_password_hash(password: &str, stored: &[u8]) -> bool {
    let candidate = password_hash(password);
    if stored.len() != candidate.len() {
        return false;
    }
    candidate.ct_eq(stored).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_key_pads_short_passwords() {
        let key = password_key("abc");
        assert_eq!(&key[..3], b"abc");
        assert!(key[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn password_key_truncates_long_passwords() {
        let long = "x".repeat(40);
        let key = password_key(&long);
        assert_eq!(key, password_key(&"x".repeat(32)));
    }

    #[test]
    fn raw_roundtrip_all_block_lengths() {
        for blocks in 1..=4 {
            let plaintext = vec![0xabu8; blocks * BLOCK_SIZE];
            let ct = encrypt_raw("hunter2", &plaintext).unwrap();
            assert_eq!(ct.len(), plaintext.len());
            assert_ne!(ct, plaintext);
            assert_eq!(decrypt_raw("hunter2", &ct).unwrap(), plaintext);
        }
    }

    #[test]
    fn raw_rejects_unaligned_input() {
        assert!(matches!(
            encrypt_raw("pw", &[0u8; 17]),
            Err(CipherError::BlockLength(17))
        ));
        assert!(decrypt_raw("pw", &[0u8; 15]).is_err());
        assert!(decrypt_raw("pw", &[]).is_err());
    }

    #[test]
    fn raw_wrong_password_garbles() {
        let plaintext = [7u8; 32];
        let ct = encrypt_raw("right", &plaintext).unwrap();
        let wrong = decrypt_raw("wrong", &ct).unwrap();
        assert_ne!(wrong, plaintext);
    }

    #[test]
    fn text_roundtrip_arbitrary_length() {
        let seed = "vast page cool sibling mandate panther rubber thumb \
                    eagle noble fault lonely hurdle vapor tiny";
        let ct = encrypt_text("pw", seed.as_bytes());
        assert_eq!(ct.len() % BLOCK_SIZE, 0);
        assert_eq!(decrypt_text("pw", &ct).unwrap(), seed.as_bytes());
    }

    #[test]
    fn text_wrong_password_is_an_error() {
        // PKCS#7 unpadding under the wrong key fails with overwhelming
        // probability; retry margin comes from the distinct plaintexts.
        let mut failures = 0;
        for i in 0..8 {
            let ct = encrypt_text("right", format!("seed phrase {i}").as_bytes());
            if decrypt_text("wrong", &ct).is_err() {
                failures += 1;
            }
        }
        assert!(failures >= 7);
    }

    #[test]
    fn password_hash_verifies() {
        let stored = password_hash("hunter2");
        assert!(verify_password_hash("hunter2", &stored));
        assert!(!verify_password_hash("hunter3", &stored));
        assert!(!verify_password_hash("hunter2", &stored[..16]));
    }
}
