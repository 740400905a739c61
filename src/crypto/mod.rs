//! Cryptographic building blocks: password-bound AES-CBC wrapping of key
//! material, SECP256K1 key handling and address derivation, and mnemonic
//! seed phrases.

pub mod cipher;
pub mod keys;
pub mod mnemonic;
