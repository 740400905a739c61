//! Seed phrase generation and validation.
//!
//! A wallet seed is a 15-word phrase drawn from either the English or the
//! Simplified Chinese BIP39 word list. Validation checks the word count
//! only: wallets migrated from earlier databases may hold phrases without
//! a BIP39 checksum, so parsing is intentionally lenient.

use bip39::{Language, Mnemonic};

use crate::constants::SEED_WORD_COUNT;

/// Word list selector, wire-coded for the bus (`0` = English,
/// `1` = Simplified Chinese).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedLang {
    English,
    SimplifiedChinese,
}

impl SeedLang {
    /// Decode the bus language code.
    pub fn from_code(code: i32) -> Option<SeedLang> {
        match code {
            0 => Some(SeedLang::English),
            1 => Some(SeedLang::SimplifiedChinese),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            SeedLang::English => 0,
            SeedLang::SimplifiedChinese => 1,
        }
    }

    /// Guess the language of an existing phrase from its script.
    pub fn detect(seed: &str) -> SeedLang {
        if seed.chars().any(|c| !c.is_ascii()) {
            SeedLang::SimplifiedChinese
        } else {
            SeedLang::English
        }
    }

    fn wordlist(self) -> Language {
        match self {
            SeedLang::English => Language::English,
            SeedLang::SimplifiedChinese => Language::SimplifiedChinese,
        }
    }
}

/// Mnemonic failures.
#[derive(Clone, Debug, thiserror::Error)]
pub enum MnemonicError {
    #[error("the seed must be {SEED_WORD_COUNT} words")]
    WordCount(usize),
    #[error("seed generation failed: {0}")]
    Generation(String),
}

/// Entropy behind a 15-word phrase: 15 words x 11 bits = 160 entropy bits
/// plus a 5-bit checksum.
const SEED_ENTROPY_BYTES: usize = 20;

/// Generate a fresh 15-word seed phrase in the requested language.
pub fn generate(lang: SeedLang) -> Result<String, MnemonicError> {
    use rand::RngCore;
    let mut entropy = [0u8; SEED_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(lang.wordlist(), &entropy)
        .map_err(|e| MnemonicError::Generation(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Normalize a user-supplied phrase: split on whitespace, require exactly
/// 15 words, re-join with single spaces.
pub fn canonicalize(seed: &str) -> Result<String, MnemonicError> {
    let words: Vec<&str> = seed.split_whitespace().collect();
    if words.len() != SEED_WORD_COUNT {
        return Err(MnemonicError::WordCount(words.len()));
    }
    Ok(words.join(" "))
}
