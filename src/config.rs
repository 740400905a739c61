//! Configuration for the wallet module.
//!
//! Loads an optional `wallet.toml` from the data directory; missing file or
//! missing keys fall back to defaults. The limits collected here are fixed
//! for the lifetime of a wallet instance.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Wallet configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Directory holding the wallet database.
    pub db_path: PathBuf,
    /// Lowest fee `SetFee` accepts; also the default fee of a fresh wallet.
    pub min_fee: i64,
    /// Per-block transaction capacity of the tx-log ordinal encoding.
    pub max_tx_per_block: i64,
    /// Page size used when back-filling transactions for imported addresses.
    pub max_tx_hashes_per_page: i64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            db_path: "./wallet-data".into(),
            min_fee: crate::constants::MIN_FEE,
            max_tx_per_block: crate::constants::MAX_TX_NUM_PER_BLOCK,
            max_tx_hashes_per_page: crate::constants::MAX_TX_HASHES_PER_PAGE,
        }
    }
}

impl WalletConfig {
    /// Load configuration from `wallet.toml` in the given directory.
    /// Returns `Default` if the file doesn't exist.
    pub fn load(data_dir: &Path) -> Self {
        let config_path = data_dir.join("wallet.toml");
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {}, using defaults",
                        config_path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        let config = WalletConfig::default();
        assert_eq!(config.min_fee, crate::constants::MIN_FEE);
        assert_eq!(
            config.max_tx_per_block,
            crate::constants::MAX_TX_NUM_PER_BLOCK
        );
        assert_eq!(
            config.max_tx_hashes_per_page,
            crate::constants::MAX_TX_HASHES_PER_PAGE
        );
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
db_path = "/tmp/wallet"
min_fee = 2000000
max_tx_hashes_per_page = 50
"#;
        let config: WalletConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/wallet"));
        assert_eq!(config.min_fee, 2_000_000);
        assert_eq!(config.max_tx_hashes_per_page, 50);
        // unset keys keep their defaults
        assert_eq!(
            config.max_tx_per_block,
            crate::constants::MAX_TX_NUM_PER_BLOCK
        );
    }

    #[test]
    fn missing_config_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = WalletConfig::load(dir.path());
        assert_eq!(config.min_fee, crate::constants::MIN_FEE);
    }
}
