//! # Aureus wallet core
//!
//! The wallet module of an Aureus node. It custodies user key material,
//! authorizes transactions on behalf of owned addresses, and maintains a
//! local, height-ordered index of on-chain activity relevant to those
//! addresses:
//!
//! - **Secret lifecycle** — seed creation and persistence, password
//!   rotation, lock/unlock with an optional auto-relock timer
//! - **Key custody** — SECP256K1 keys encrypted per-address under the
//!   wallet password (AES-256-CBC)
//! - **Transaction authoring** — transfer / withdraw / merge transactions,
//!   signed and handed to the mempool collaborator
//! - **Block scanning** — connect/disconnect events maintain the wallet's
//!   transaction log and signal the consensus layer on ticket changes
//! - **Catch-up** — background back-fill of historical transactions for
//!   newly imported addresses
//!
//! The node wires the wallet to its collaborators through typed channel
//! handles (see [`bus`]); all request handling is serialized through a
//! single dispatcher task (see [`wallet::Wallet::run`]).

pub mod bus;
pub mod catchup;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod scanner;
pub mod secret;
pub mod store;
pub mod wallet;

/// Protocol constants
pub mod constants {
    /// Lowest accepted transaction fee (in base units).
    pub const MIN_FEE: i64 = 1_000_000;
    /// Per-block transaction capacity of the ordinal encoding; the tx-log
    /// key is `height * MAX_TX_NUM_PER_BLOCK + index`.
    pub const MAX_TX_NUM_PER_BLOCK: i64 = 100_000;
    /// Page size for catch-up requests against the blockchain service.
    pub const MAX_TX_HASHES_PER_PAGE: i64 = 100;
    /// A seed phrase is exactly this many words.
    pub const SEED_WORD_COUNT: usize = 15;
    /// Version byte prepended to the pubkey hash before base58-check.
    pub const ADDRESS_VERSION: u8 = 0;
}

/// 32-byte hash used throughout the protocol
pub type Hash = [u8; 32];

/// Compute the SHA-256 digest of a byte slice.
pub fn sha256(data: &[u8]) -> Hash {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the SHA-256 hash of length-prefixed concatenated slices.
///
/// Each part is prefixed with its length as a little-endian u64, preventing
/// ambiguous concatenation (e.g., `["AB","C"]` vs `["A","BC"]`).
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_concat_is_unambiguous() {
        let a = hash_concat(&[b"AB", b"C"]);
        let b = hash_concat(&[b"A", b"BC"]);
        assert_ne!(a, b);
    }

    #[test]
    fn sha256_distinguishes_inputs() {
        assert_ne!(sha256(b"x"), sha256(b"y"));
        assert_eq!(sha256(b"x"), sha256(b"x"));
    }
}
