//! Persistent wallet storage.
//!
//! A typed façade over a single sled tree. The schema is prefix-keyed:
//!
//! | key | value |
//! |---|---|
//! | `Account:<addr>` | bincode [`AccountRecord`] |
//! | `Label:<label>` | the owning address |
//! | `Seed` | password-encrypted mnemonic |
//! | `SeedLang` | word-list code |
//! | `PwHash` | password hash |
//! | `Encrypted` | 0/1 flag |
//! | `FeeAmount` | i64, little-endian |
//! | `tx:<18-digit ordinal>` | bincode [`WalletTxDetail`] |
//!
//! Tx-log keys are zero-padded so lexicographic order equals chain order;
//! range scans over the `tx:` prefix drive transaction listing. Multi-key
//! writes go through [`StoreBatch`], which commits atomically.

use serde::{Deserialize, Serialize};

use crate::chain::{ReceiptData, Transaction};
use crate::crypto::mnemonic::SeedLang;

const ACCOUNT_PREFIX: &str = "Account:";
const LABEL_PREFIX: &str = "Label:";
const TX_PREFIX: &str = "tx:";
/// First key past the `tx:` prefix range (`;` is the byte after `:`).
const TX_PREFIX_END: &str = "tx;";

const SEED_KEY: &[u8] = b"Seed";
const SEED_LANG_KEY: &[u8] = b"SeedLang";
const PW_HASH_KEY: &[u8] = b"PwHash";
const ENCRYPTED_KEY: &[u8] = b"Encrypted";
const FEE_KEY: &[u8] = b"FeeAmount";

/// Errors from storage operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn io_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(e.to_string())
}

/// A wallet-owned account: address, unique label, and the private key
/// encrypted under the wallet password (hex of the AES-CBC ciphertext).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub addr: String,
    pub label: String,
    pub privkey: String,
}

/// A wallet-relevant transaction as recorded in the tx log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletTxDetail {
    pub tx: Transaction,
    pub receipt: ReceiptData,
    pub height: i64,
    pub index: i64,
    pub blocktime: i64,
    pub amount: i64,
    pub from_addr: String,
}

/// Global chain position of a transaction: `height * stride + index`.
pub fn tx_ordinal(height: i64, index: i64, stride: i64) -> i64 {
    height * stride + index
}

fn tx_key(ordinal: i64) -> String {
    format!("{TX_PREFIX}{ordinal:018}")
}

fn account_key(addr: &str) -> String {
    format!("{ACCOUNT_PREFIX}{addr}")
}

fn label_key(label: &str) -> String {
    format!("{LABEL_PREFIX}{label}")
}

/// Staged multi-key write; committed atomically by [`WalletStore::apply`].
#[derive(Default)]
pub struct StoreBatch {
    inner: sled::Batch,
}

impl StoreBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an account record together with its label index entry.
    pub fn put_account(&mut self, record: &AccountRecord) -> Result<(), StoreError> {
        let value =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.inner.insert(account_key(&record.addr).as_bytes(), value);
        self.inner.insert(
            label_key(&record.label).as_bytes(),
            record.addr.as_bytes().to_vec(),
        );
        Ok(())
    }

    pub fn del_label(&mut self, label: &str) {
        self.inner.remove(label_key(label).as_bytes());
    }

    pub fn put_seed(&mut self, encrypted: &[u8], lang: SeedLang) {
        self.inner.insert(SEED_KEY, encrypted.to_vec());
        self.inner
            .insert(SEED_LANG_KEY, (lang.code() as i64).to_le_bytes().to_vec());
    }

    pub fn put_password_hash(&mut self, hash: &[u8]) {
        self.inner.insert(PW_HASH_KEY, hash.to_vec());
    }

    pub fn put_encrypted_flag(&mut self) {
        self.inner.insert(ENCRYPTED_KEY, vec![1u8]);
    }

    /// Stage a tx-log entry at its deterministic ordinal key.
    pub fn put_tx_detail(&mut self, ordinal: i64, detail: &WalletTxDetail) -> Result<(), StoreError> {
        let value =
            bincode::serialize(detail).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.inner.insert(tx_key(ordinal).as_bytes(), value);
        Ok(())
    }

    pub fn del_tx_detail(&mut self, ordinal: i64) {
        self.inner.remove(tx_key(ordinal).as_bytes());
    }
}

/// Typed key-value store backing the wallet.
#[derive(Clone)]
pub struct WalletStore {
    db: sled::Db,
}

impl WalletStore {
    /// Open or create the wallet database at the given path.
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(io_err)?;
        Ok(WalletStore { db })
    }

    /// Open a temporary in-memory database (for testing).
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(io_err)?;
        Ok(WalletStore { db })
    }

    /// Commit a staged batch atomically.
    pub fn apply(&self, batch: StoreBatch) -> Result<(), StoreError> {
        self.db.apply_batch(batch.inner).map_err(io_err)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(io_err)?;
        Ok(())
    }

    // ── accounts ──

    pub fn get_account_by_addr(&self, addr: &str) -> Result<Option<AccountRecord>, StoreError> {
        match self.db.get(account_key(addr).as_bytes()).map_err(io_err)? {
            Some(bytes) => {
                let record = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn get_account_by_label(&self, label: &str) -> Result<Option<AccountRecord>, StoreError> {
        match self.db.get(label_key(label).as_bytes()).map_err(io_err)? {
            Some(addr_bytes) => {
                let addr = String::from_utf8_lossy(&addr_bytes).into_owned();
                self.get_account_by_addr(&addr)
            }
            None => Ok(None),
        }
    }

    /// Store an account record and its label index entry atomically.
    pub fn put_account(&self, record: &AccountRecord) -> Result<(), StoreError> {
        let mut batch = StoreBatch::new();
        batch.put_account(record)?;
        self.apply(batch)
    }

    /// Re-label an account: rewrites the record and the label index,
    /// removing the old label entry, in one batch.
    pub fn rename_label(&self, record: &AccountRecord, old_label: &str) -> Result<(), StoreError> {
        let mut batch = StoreBatch::new();
        batch.put_account(record)?;
        if old_label != record.label {
            batch.del_label(old_label);
        }
        self.apply(batch)
    }

    /// All account records, in address order.
    pub fn accounts(&self) -> Result<Vec<AccountRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in self.db.scan_prefix(ACCOUNT_PREFIX.as_bytes()) {
            let (_, bytes) = entry.map_err(io_err)?;
            let record = bincode::deserialize(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    // ── seed / password ──

    pub fn has_seed(&self) -> Result<bool, StoreError> {
        self.db.contains_key(SEED_KEY).map_err(io_err)
    }

    /// The encrypted mnemonic and its language tag, if a seed was saved.
    pub fn get_seed(&self) -> Result<Option<(Vec<u8>, SeedLang)>, StoreError> {
        let Some(encrypted) = self.db.get(SEED_KEY).map_err(io_err)? else {
            return Ok(None);
        };
        let lang = match self.db.get(SEED_LANG_KEY).map_err(io_err)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                SeedLang::from_code(i64::from_le_bytes(buf) as i32).unwrap_or(SeedLang::English)
            }
            _ => SeedLang::English,
        };
        Ok(Some((encrypted.to_vec(), lang)))
    }

    pub fn get_password_hash(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .db
            .get(PW_HASH_KEY)
            .map_err(io_err)?
            .map(|b| b.to_vec()))
    }

    pub fn get_encrypted_flag(&self) -> Result<bool, StoreError> {
        Ok(self
            .db
            .get(ENCRYPTED_KEY)
            .map_err(io_err)?
            .map(|b| b.as_ref() == [1u8])
            .unwrap_or(false))
    }

    // ── fee ──

    pub fn get_fee(&self) -> Result<Option<i64>, StoreError> {
        match self.db.get(FEE_KEY).map_err(io_err)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(Some(i64::from_le_bytes(buf)))
            }
            _ => Ok(None),
        }
    }

    pub fn set_fee(&self, amount: i64) -> Result<(), StoreError> {
        self.db
            .insert(FEE_KEY, amount.to_le_bytes().to_vec())
            .map_err(io_err)?;
        Ok(())
    }

    // ── tx log ──

    pub fn get_tx_detail(&self, ordinal: i64) -> Result<Option<WalletTxDetail>, StoreError> {
        match self.db.get(tx_key(ordinal).as_bytes()).map_err(io_err)? {
            Some(bytes) => {
                let detail = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(detail))
            }
            None => Ok(None),
        }
    }

    /// A page of the tx log.
    ///
    /// `ascending = false` walks from the newest entry downwards (the
    /// default listing direction); `from` is an exclusive cursor ordinal
    /// taken from the previous page.
    pub fn tx_detail_page(
        &self,
        from: Option<i64>,
        count: usize,
        ascending: bool,
    ) -> Result<Vec<WalletTxDetail>, StoreError> {
        use std::ops::Bound;

        let low = match from {
            Some(ordinal) if ascending => Bound::Excluded(tx_key(ordinal).into_bytes()),
            _ => Bound::Included(TX_PREFIX.as_bytes().to_vec()),
        };
        let high = match from {
            Some(ordinal) if !ascending => Bound::Excluded(tx_key(ordinal).into_bytes()),
            _ => Bound::Excluded(TX_PREFIX_END.as_bytes().to_vec()),
        };

        let range = self.db.range::<Vec<u8>, _>((low, high));
        let mut details = Vec::with_capacity(count);
        let entries: Box<dyn Iterator<Item = _>> = if ascending {
            Box::new(range)
        } else {
            Box::new(range.rev())
        };
        for entry in entries.take(count) {
            let (_, bytes) = entry.map_err(io_err)?;
            let detail = bincode::deserialize(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            details.push(detail);
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ReceiptStatus, Transaction};

    fn temp_store() -> WalletStore {
        WalletStore::open_temporary().unwrap()
    }

    fn record(addr: &str, label: &str) -> AccountRecord {
        AccountRecord {
            addr: addr.into(),
            label: label.into(),
            privkey: "00".repeat(32),
        }
    }

    fn detail(height: i64, index: i64) -> WalletTxDetail {
        WalletTxDetail {
            tx: Transaction::new("coins", vec![], 0, "to".into(), 1),
            receipt: ReceiptData {
                status: ReceiptStatus::Ok,
            },
            height,
            index,
            blocktime: 1000,
            amount: 0,
            from_addr: String::new(),
        }
    }

    #[test]
    fn account_lookup_by_addr_and_label() {
        let store = temp_store();
        let rec = record("addr1", "main");
        store.put_account(&rec).unwrap();

        assert_eq!(store.get_account_by_addr("addr1").unwrap().unwrap(), rec);
        assert_eq!(store.get_account_by_label("main").unwrap().unwrap(), rec);
        assert!(store.get_account_by_addr("other").unwrap().is_none());
        assert!(store.get_account_by_label("other").unwrap().is_none());
    }

    #[test]
    fn accounts_scan_returns_all() {
        let store = temp_store();
        store.put_account(&record("a", "l1")).unwrap();
        store.put_account(&record("b", "l2")).unwrap();
        let all = store.accounts().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn rename_label_drops_old_index_entry() {
        let store = temp_store();
        store.put_account(&record("a", "old")).unwrap();

        let renamed = record("a", "new");
        store.rename_label(&renamed, "old").unwrap();

        assert!(store.get_account_by_label("old").unwrap().is_none());
        assert_eq!(store.get_account_by_label("new").unwrap().unwrap(), renamed);
        assert_eq!(
            store.get_account_by_addr("a").unwrap().unwrap().label,
            "new"
        );
    }

    #[test]
    fn seed_roundtrip() {
        let store = temp_store();
        assert!(!store.has_seed().unwrap());
        assert!(store.get_seed().unwrap().is_none());

        let mut batch = StoreBatch::new();
        batch.put_seed(b"ciphertext", SeedLang::SimplifiedChinese);
        store.apply(batch).unwrap();

        assert!(store.has_seed().unwrap());
        let (encrypted, lang) = store.get_seed().unwrap().unwrap();
        assert_eq!(encrypted, b"ciphertext");
        assert_eq!(lang, SeedLang::SimplifiedChinese);
    }

    #[test]
    fn password_hash_and_flag() {
        let store = temp_store();
        assert!(store.get_password_hash().unwrap().is_none());
        assert!(!store.get_encrypted_flag().unwrap());

        let mut batch = StoreBatch::new();
        batch.put_password_hash(&[9u8; 32]);
        batch.put_encrypted_flag();
        store.apply(batch).unwrap();

        assert_eq!(store.get_password_hash().unwrap().unwrap(), vec![9u8; 32]);
        assert!(store.get_encrypted_flag().unwrap());
    }

    #[test]
    fn fee_roundtrip() {
        let store = temp_store();
        assert!(store.get_fee().unwrap().is_none());
        store.set_fee(2_000_000).unwrap();
        assert_eq!(store.get_fee().unwrap(), Some(2_000_000));
    }

    #[test]
    fn tx_detail_put_get_delete() {
        let store = temp_store();
        let stride = crate::constants::MAX_TX_NUM_PER_BLOCK;
        let ordinal = tx_ordinal(5, 3, stride);
        assert_eq!(ordinal, 500_003);

        let mut batch = StoreBatch::new();
        batch.put_tx_detail(ordinal, &detail(5, 3)).unwrap();
        store.apply(batch).unwrap();

        let got = store.get_tx_detail(ordinal).unwrap().unwrap();
        assert_eq!((got.height, got.index), (5, 3));

        let mut batch = StoreBatch::new();
        batch.del_tx_detail(ordinal);
        store.apply(batch).unwrap();
        assert!(store.get_tx_detail(ordinal).unwrap().is_none());
    }

    #[test]
    fn tx_page_descends_from_newest() {
        let store = temp_store();
        let stride = crate::constants::MAX_TX_NUM_PER_BLOCK;
        let mut batch = StoreBatch::new();
        for (h, i) in [(1, 0), (1, 1), (2, 0), (3, 5)] {
            batch
                .put_tx_detail(tx_ordinal(h, i, stride), &detail(h, i))
                .unwrap();
        }
        store.apply(batch).unwrap();

        let page = store.tx_detail_page(None, 3, false).unwrap();
        let positions: Vec<_> = page.iter().map(|d| (d.height, d.index)).collect();
        assert_eq!(positions, vec![(3, 5), (2, 0), (1, 1)]);

        // cursor continues past the previous page, exclusive
        let cursor = tx_ordinal(1, 1, stride);
        let rest = store.tx_detail_page(Some(cursor), 3, false).unwrap();
        let positions: Vec<_> = rest.iter().map(|d| (d.height, d.index)).collect();
        assert_eq!(positions, vec![(1, 0)]);
    }

    #[test]
    fn tx_page_ascending_with_cursor() {
        let store = temp_store();
        let stride = crate::constants::MAX_TX_NUM_PER_BLOCK;
        let mut batch = StoreBatch::new();
        for (h, i) in [(1, 0), (2, 0), (3, 0)] {
            batch
                .put_tx_detail(tx_ordinal(h, i, stride), &detail(h, i))
                .unwrap();
        }
        store.apply(batch).unwrap();

        let page = store
            .tx_detail_page(Some(tx_ordinal(1, 0, stride)), 10, true)
            .unwrap();
        let positions: Vec<_> = page.iter().map(|d| (d.height, d.index)).collect();
        assert_eq!(positions, vec![(2, 0), (3, 0)]);
    }

    #[test]
    fn batch_is_atomic_over_mixed_ops() {
        let store = temp_store();
        store.put_account(&record("a", "l")).unwrap();

        let mut batch = StoreBatch::new();
        batch.put_account(&record("b", "l2")).unwrap();
        batch.del_label("l");
        batch.put_tx_detail(7, &detail(0, 7)).unwrap();
        store.apply(batch).unwrap();

        assert!(store.get_account_by_label("l").unwrap().is_none());
        assert!(store.get_account_by_label("l2").unwrap().is_some());
        assert!(store.get_tx_detail(7).unwrap().is_some());
    }
}
