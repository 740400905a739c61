//! The wallet core: secret-lifecycle state machine, account registry,
//! transaction authoring, and the dispatcher that serializes every
//! operation.
//!
//! A `Wallet` owns the store and the in-memory [`SecretState`]; the node
//! talks to it through the request channel created by
//! [`crate::bus::wallet_channel`] and serviced by [`Wallet::run`]. Handlers
//! never interleave — the dispatcher is the wallet mutex. The only state
//! shared with other tasks is the secret state (the auto-relock timer
//! flips the lock flag under its mutex) and the store itself, whose
//! batches are atomic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use zeroize::Zeroizing;

use crate::bus::{
    AccountsHandle, BusError, ChainHandle, ConsensusHandle, MempoolHandle, ReplyHash, ReplyHashes,
    ReplySeed, ReplyWalletTickets, WalletAccount, WalletAccounts, WalletRequest, WalletTxDetails,
};
use crate::chain::{Account, CodecError, CoinsAction, Transaction, COINS_EXECUTOR};
use crate::config::WalletConfig;
use crate::crypto::cipher::{self, CipherError};
use crate::crypto::keys::{self, KeyError};
use crate::crypto::mnemonic::{self, MnemonicError, SeedLang};
use crate::secret::{self, SecretState};
use crate::store::{AccountRecord, StoreBatch, StoreError, WalletStore};

/// Wallet operation failures.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("input parameter error")]
    InvalidInput,
    #[error("wallet is locked")]
    Locked,
    #[error("please save seed first")]
    SaveSeedFirst,
    #[error("unlock wallet first")]
    UnlockFirst,
    #[error("wrong wallet password")]
    BadPassword,
    #[error("a seed has already been saved")]
    SeedExists,
    #[error("label has already been used in wallet")]
    LabelTaken,
    #[error("address already exists in wallet")]
    AddressTaken,
    #[error("private key already exists in wallet")]
    PrivKeyAlreadyPresent,
    #[error("address already bound to a different private key")]
    PrivKeyConflict,
    #[error("insufficient balance: have {available}, need {needed}")]
    InsufficientBalance { available: i64, needed: i64 },
    #[error("account not found in wallet")]
    AccountNotFound,
    #[error("no tickets for wallet addresses")]
    NoTickets,
    #[error("mempool rejected transaction: {0}")]
    Mempool(String),
    #[error("{op}: {msg}")]
    Downstream { op: &'static str, msg: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("wallet has shut down")]
    Shutdown,
}

fn downstream(op: &'static str) -> impl FnOnce(BusError) -> WalletError {
    move |e| WalletError::Downstream {
        op,
        msg: e.to_string(),
    }
}

/// Channel handles to the wallet's collaborators.
pub struct WalletPorts {
    pub accounts: AccountsHandle,
    pub mempool: MempoolHandle,
    pub chain: ChainHandle,
    pub consensus: ConsensusHandle,
}

/// The wallet core.
pub struct Wallet {
    pub(crate) config: WalletConfig,
    pub(crate) store: WalletStore,
    pub(crate) secret: Arc<Mutex<SecretState>>,
    pub(crate) fee_amount: i64,
    pub(crate) encrypted: bool,
    pub(crate) accounts: AccountsHandle,
    pub(crate) mempool: MempoolHandle,
    pub(crate) chain: ChainHandle,
    pub(crate) consensus: ConsensusHandle,
    pub(crate) tasks: TaskTracker,
    pub(crate) shutdown: CancellationToken,
}

impl Wallet {
    /// Open the wallet database at the configured path.
    pub fn open(config: WalletConfig, ports: WalletPorts) -> Result<Self, WalletError> {
        let store = WalletStore::open(&config.db_path)?;
        Self::with_store(store, config, ports)
    }

    /// Build a wallet over an already-open store.
    pub fn with_store(
        store: WalletStore,
        config: WalletConfig,
        ports: WalletPorts,
    ) -> Result<Self, WalletError> {
        let fee_amount = store.get_fee()?.unwrap_or(config.min_fee);
        let encrypted = store.get_encrypted_flag()?;
        Ok(Wallet {
            config,
            store,
            secret: Arc::new(Mutex::new(SecretState::new())),
            fee_amount,
            encrypted,
            accounts: ports.accounts,
            mempool: ports.mempool,
            chain: ports.chain,
            consensus: ports.consensus,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token that stops the dispatcher when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Dispatcher loop: drains the request channel until it closes or the
    /// cancellation token fires, then waits out background catch-up tasks
    /// and flushes the store.
    pub async fn run(mut self, mut requests: mpsc::Receiver<WalletRequest>) {
        tracing::info!("wallet dispatcher started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
            }
        }
        self.close().await;
    }

    async fn close(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        if let Err(e) = self.store.flush() {
            tracing::warn!(error = %e, "store flush failed on shutdown");
        }
        tracing::info!("wallet module closed");
    }

    async fn handle(&mut self, request: WalletRequest) {
        match request {
            WalletRequest::GetAccountList { reply } => {
                let _ = reply.send(self.get_account_list().await);
            }
            WalletRequest::NewAccount { label, reply } => {
                let _ = reply.send(self.new_account(&label).await);
            }
            WalletRequest::ImportPrivKey {
                label,
                privkey,
                reply,
            } => {
                let _ = reply.send(self.import_privkey(&label, &privkey).await);
            }
            WalletRequest::SendToAddress {
                from,
                to,
                amount,
                note,
                reply,
            } => {
                let _ = reply.send(self.send_to_address(&from, &to, amount, &note).await);
            }
            WalletRequest::MergeBalance { to, reply } => {
                let _ = reply.send(self.merge_balance(&to).await);
            }
            WalletRequest::SetFee { amount, reply } => {
                let _ = reply.send(self.set_fee(amount));
            }
            WalletRequest::SetLabel { addr, label, reply } => {
                let _ = reply.send(self.set_label(&addr, &label).await);
            }
            WalletRequest::SetPassword { old, new, reply } => {
                let _ = reply.send(self.set_password(&old, &new).await);
            }
            WalletRequest::Lock { reply } => {
                let _ = reply.send(self.lock().await);
            }
            WalletRequest::Unlock {
                password,
                timeout_secs,
                reply,
            } => {
                let _ = reply.send(self.unlock(&password, timeout_secs).await);
            }
            WalletRequest::GenSeed { lang, reply } => {
                let _ = reply.send(self.gen_seed(lang));
            }
            WalletRequest::GetSeed { password, reply } => {
                let _ = reply.send(self.get_seed(&password).await);
            }
            WalletRequest::SaveSeed {
                password,
                seed,
                reply,
            } => {
                let _ = reply.send(self.save_seed(&password, &seed).await);
            }
            WalletRequest::GetWalletStatus { reply } => {
                let _ = reply.send(self.check_status().await);
            }
            WalletRequest::GetTickets { reply } => {
                let _ = reply.send(self.get_tickets().await);
            }
            WalletRequest::GetTxList {
                from,
                count,
                direction,
                reply,
            } => {
                let _ = reply.send(self.get_tx_list(from, count, direction));
            }
            WalletRequest::BlockConnected(detail) => {
                self.process_block(&detail, true).await;
            }
            WalletRequest::BlockDisconnected(detail) => {
                self.process_block(&detail, false).await;
            }
        }
    }

    // ── gates ──

    /// The key-lockout gate: the wallet must be unlocked, a seed must have
    /// been saved, and the password must be cached. Returns the cached
    /// password for key material access.
    async fn status_gate(&self) -> Result<Zeroizing<String>, WalletError> {
        let password = {
            let guard = self.secret.lock().await;
            if guard.is_locked() {
                return Err(WalletError::Locked);
            }
            guard
                .cached_password()
                .map(|pw| Zeroizing::new(pw.to_string()))
        };
        if !self.store.has_seed()? {
            return Err(WalletError::SaveSeedFirst);
        }
        password.ok_or(WalletError::UnlockFirst)
    }

    async fn check_status(&self) -> Result<(), WalletError> {
        self.status_gate().await.map(drop)
    }

    // ── seed ──

    /// Generate a fresh seed phrase; nothing is persisted.
    fn gen_seed(&self, lang: i32) -> Result<ReplySeed, WalletError> {
        let lang = SeedLang::from_code(lang).ok_or(WalletError::InvalidInput)?;
        let seed = mnemonic::generate(lang)?;
        Ok(ReplySeed { seed })
    }

    /// Persist the seed encrypted under `password` and install the
    /// password hash. One seed per wallet; the wallet stays locked.
    async fn save_seed(&mut self, password: &str, seed: &str) -> Result<(), WalletError> {
        if self.store.has_seed()? {
            return Err(WalletError::SeedExists);
        }
        if password.is_empty() || seed.is_empty() {
            return Err(WalletError::InvalidInput);
        }
        let canonical = mnemonic::canonicalize(seed)?;
        let lang = SeedLang::detect(&canonical);

        let mut batch = StoreBatch::new();
        batch.put_seed(&cipher::encrypt_text(password, canonical.as_bytes()), lang);
        batch.put_password_hash(&cipher::password_hash(password));
        batch.put_encrypted_flag();
        self.store.apply(batch)?;

        self.encrypted = true;
        self.secret.lock().await.cache_password(password);
        tracing::info!(lang = lang.code(), "seed saved");
        Ok(())
    }

    /// Decrypt and return the stored seed. Requires the unlocked gate and
    /// the correct password.
    async fn get_seed(&self, password: &str) -> Result<ReplySeed, WalletError> {
        let cached = self.status_gate().await?;
        if cached.as_str() != password {
            return Err(WalletError::BadPassword);
        }
        Ok(ReplySeed {
            seed: self.read_seed(password)?,
        })
    }

    fn read_seed(&self, password: &str) -> Result<String, WalletError> {
        let (encrypted, _lang) = self.store.get_seed()?.ok_or(WalletError::SaveSeedFirst)?;
        let bytes =
            cipher::decrypt_text(password, &encrypted).map_err(|_| WalletError::BadPassword)?;
        String::from_utf8(bytes).map_err(|_| WalletError::BadPassword)
    }

    // ── lock machine ──

    async fn lock(&self) -> Result<(), WalletError> {
        if !self.store.has_seed()? {
            return Err(WalletError::SaveSeedFirst);
        }
        self.secret.lock().await.lock();
        Ok(())
    }

    /// Unlock with `password`; a positive `timeout_secs` arms the
    /// auto-relock timer. Signals consensus to re-read ticket keys.
    async fn unlock(&self, password: &str, timeout_secs: i64) -> Result<(), WalletError> {
        if !self.store.has_seed()? {
            return Err(WalletError::SaveSeedFirst);
        }
        let cached = {
            let guard = self.secret.lock().await;
            guard.cached_password().map(String::from)
        };
        match cached {
            Some(pw) => {
                if pw != password {
                    return Err(WalletError::BadPassword);
                }
            }
            None if self.encrypted => {
                let stored = self
                    .store
                    .get_password_hash()?
                    .ok_or(WalletError::BadPassword)?;
                if !cipher::verify_password_hash(password, &stored) {
                    return Err(WalletError::BadPassword);
                }
            }
            None => {}
        }
        {
            let mut guard = self.secret.lock().await;
            if self.encrypted || !password.is_empty() {
                guard.cache_password(password);
            }
            guard.set_unlocked();
        }
        if timeout_secs > 0 {
            secret::arm_relock(&self.secret, Duration::from_secs(timeout_secs as u64)).await;
        }
        self.consensus.flush_tickets().await;
        Ok(())
    }

    /// Rotate the wallet password: re-hash, re-encrypt the seed and every
    /// account key. All writes land in one batch; account records that
    /// cannot be decoded are skipped, not fatal.
    async fn set_password(&mut self, old: &str, new: &str) -> Result<(), WalletError> {
        if self.secret.lock().await.is_locked() {
            return Err(WalletError::Locked);
        }
        if !self.store.has_seed()? {
            return Err(WalletError::SaveSeedFirst);
        }
        if old.is_empty() || new.is_empty() {
            return Err(WalletError::InvalidInput);
        }
        let cached = {
            let guard = self.secret.lock().await;
            guard.cached_password().map(String::from)
        };
        match cached {
            Some(pw) => {
                if pw != old {
                    return Err(WalletError::BadPassword);
                }
            }
            None if self.encrypted => {
                let stored = self
                    .store
                    .get_password_hash()?
                    .ok_or(WalletError::BadPassword)?;
                if !cipher::verify_password_hash(old, &stored) {
                    return Err(WalletError::BadPassword);
                }
            }
            None => {}
        }

        let (encrypted_seed, lang) = self.store.get_seed()?.ok_or(WalletError::SaveSeedFirst)?;
        let seed_bytes =
            cipher::decrypt_text(old, &encrypted_seed).map_err(|_| WalletError::BadPassword)?;

        let mut batch = StoreBatch::new();
        batch.put_password_hash(&cipher::password_hash(new));
        batch.put_encrypted_flag();
        batch.put_seed(&cipher::encrypt_text(new, &seed_bytes), lang);

        let mut skipped = 0usize;
        for record in self.store.accounts()? {
            let rewrapped = hex::decode(&record.privkey)
                .ok()
                .and_then(|bytes| cipher::decrypt_raw(old, &bytes).ok())
                .and_then(|plain| cipher::encrypt_raw(new, &plain).ok());
            match rewrapped {
                Some(ciphertext) => {
                    batch.put_account(&AccountRecord {
                        privkey: hex::encode(ciphertext),
                        ..record
                    })?;
                }
                None => {
                    tracing::warn!(addr = %record.addr, "undecodable key record skipped in password rotation");
                    skipped += 1;
                }
            }
        }
        self.store.apply(batch)?;
        if skipped > 0 {
            tracing::warn!(skipped, "password rotation completed partially");
        }

        self.encrypted = true;
        self.secret.lock().await.cache_password(new);
        Ok(())
    }

    // ── account registry ──

    async fn get_account_list(&self) -> Result<WalletAccounts, WalletError> {
        let records = self.store.accounts()?;
        if records.is_empty() {
            return Ok(WalletAccounts { wallets: vec![] });
        }
        let addrs: Vec<String> = records.iter().map(|r| r.addr.clone()).collect();
        let accounts = self
            .accounts
            .load_accounts(addrs)
            .await
            .map_err(downstream("GetAccountList"))?;
        if accounts.len() != records.len() {
            tracing::warn!(
                records = records.len(),
                accounts = accounts.len(),
                "account service returned a mismatched balance set"
            );
        }
        let wallets = records
            .into_iter()
            .zip(accounts)
            .map(|(record, mut account)| {
                if account.addr.is_empty() {
                    account.addr = record.addr;
                }
                WalletAccount {
                    account,
                    label: record.label,
                }
            })
            .collect();
        Ok(WalletAccounts { wallets })
    }

    /// Create the seed-derived account. Derivation is deterministic, so a
    /// second call collides on the address and fails.
    async fn new_account(&self, label: &str) -> Result<WalletAccount, WalletError> {
        let password = self.status_gate().await?;
        if label.is_empty() {
            return Err(WalletError::InvalidInput);
        }
        if self.store.get_account_by_label(label)?.is_some() {
            return Err(WalletError::LabelTaken);
        }
        let seed = self.read_seed(&password)?;
        let privkey = keys::privkey_from_seed(&seed);
        let addr = keys::privkey_to_address(&privkey);
        if self.store.get_account_by_addr(&addr)?.is_some() {
            return Err(WalletError::AddressTaken);
        }
        let encrypted = cipher::encrypt_raw(&password, &privkey.secret_bytes())?;
        self.store.put_account(&AccountRecord {
            addr: addr.clone(),
            label: label.to_string(),
            privkey: hex::encode(encrypted),
        })?;
        tracing::info!(addr = %addr, label, "account created");
        // balance is an external property; a fresh account reports zero
        Ok(WalletAccount {
            account: Account {
                addr,
                ..Account::default()
            },
            label: label.to_string(),
        })
    }

    /// Import an externally generated private key and back-fill its
    /// history in the background.
    async fn import_privkey(&self, label: &str, privkey: &str) -> Result<WalletAccount, WalletError> {
        let password = self.status_gate().await?;
        if label.is_empty() || privkey.is_empty() {
            return Err(WalletError::InvalidInput);
        }
        let key = keys::privkey_from_hex(privkey)?;
        let addr = keys::privkey_to_address(&key);
        if self.store.get_account_by_label(label)?.is_some() {
            return Err(WalletError::LabelTaken);
        }
        let encrypted = hex::encode(cipher::encrypt_raw(&password, &key.secret_bytes())?);
        if let Some(existing) = self.store.get_account_by_addr(&addr)? {
            return if existing.privkey == encrypted {
                Err(WalletError::PrivKeyAlreadyPresent)
            } else {
                Err(WalletError::PrivKeyConflict)
            };
        }
        self.store.put_account(&AccountRecord {
            addr: addr.clone(),
            label: label.to_string(),
            privkey: encrypted,
        })?;

        let mut account = self
            .accounts
            .load_accounts(vec![addr.clone()])
            .await
            .map_err(downstream("ImportPrivKey"))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if account.addr.is_empty() {
            account.addr = addr.clone();
        }

        tracing::info!(addr = %addr, label, "private key imported");
        self.spawn_catchup(addr);
        self.consensus.flush_tickets().await;
        Ok(WalletAccount {
            account,
            label: label.to_string(),
        })
    }

    async fn set_label(&self, addr: &str, label: &str) -> Result<WalletAccount, WalletError> {
        if addr.is_empty() || label.is_empty() {
            return Err(WalletError::InvalidInput);
        }
        if let Some(holder) = self.store.get_account_by_label(label)? {
            if holder.addr != addr {
                return Err(WalletError::LabelTaken);
            }
        }
        let record = self
            .store
            .get_account_by_addr(addr)?
            .ok_or(WalletError::AccountNotFound)?;
        let old_label = record.label.clone();
        self.store.rename_label(
            &AccountRecord {
                label: label.to_string(),
                ..record
            },
            &old_label,
        )?;

        let mut account = self
            .accounts
            .load_accounts(vec![addr.to_string()])
            .await
            .map_err(downstream("SetLabel"))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if account.addr.is_empty() {
            account.addr = addr.to_string();
        }
        Ok(WalletAccount {
            account,
            label: label.to_string(),
        })
    }

    // ── fee ──

    fn set_fee(&mut self, amount: i64) -> Result<(), WalletError> {
        if amount < self.config.min_fee {
            tracing::warn!(amount, min_fee = self.config.min_fee, "fee below minimum");
            return Err(WalletError::InvalidInput);
        }
        self.store.set_fee(amount)?;
        self.fee_amount = amount;
        Ok(())
    }

    // ── transaction builder ──

    /// Build, sign, and submit a transfer (`amount >= 0`) or withdraw
    /// (`amount < 0`) from an owned address.
    async fn send_to_address(
        &self,
        from: &str,
        to: &str,
        amount: i64,
        note: &str,
    ) -> Result<ReplyHash, WalletError> {
        let password = self.status_gate().await?;
        if from.is_empty() || to.is_empty() {
            return Err(WalletError::InvalidInput);
        }
        let balance = self
            .accounts
            .load_accounts(vec![from.to_string()])
            .await
            .map_err(downstream("SendToAddress"))?
            .first()
            .map(|a| a.balance)
            .unwrap_or(0);
        let magnitude = amount.checked_abs().ok_or(WalletError::InvalidInput)?;
        let needed = magnitude
            .checked_add(self.fee_amount)
            .ok_or(WalletError::InvalidInput)?;
        if balance < needed {
            return Err(WalletError::InsufficientBalance {
                available: balance,
                needed,
            });
        }

        let action = if amount >= 0 {
            CoinsAction::Transfer {
                amount,
                note: note.to_string(),
            }
        } else {
            CoinsAction::Withdraw {
                amount: magnitude,
                note: note.to_string(),
            }
        };
        let privkey = self.privkey_by_addr(from, &password)?;
        let mut tx = Transaction::new(
            COINS_EXECUTOR,
            action.encode()?,
            self.fee_amount,
            to.to_string(),
            random_nonce(),
        );
        tx.sign(&privkey);

        self.submit_to_mempool(tx.clone(), "SendToAddress").await?;
        Ok(ReplyHash { hash: tx.hash() })
    }

    /// Sweep every owned balance into `to`. Per-account failures are
    /// logged and skipped; the reply carries only the hashes that were
    /// accepted.
    async fn merge_balance(&self, to: &str) -> Result<ReplyHashes, WalletError> {
        let password = self.status_gate().await?;
        if to.is_empty() {
            return Err(WalletError::InvalidInput);
        }
        let records = self.store.accounts()?;
        if records.is_empty() {
            return Ok(ReplyHashes { hashes: vec![] });
        }
        let addrs: Vec<String> = records.iter().map(|r| r.addr.clone()).collect();
        let accounts = self
            .accounts
            .load_accounts(addrs)
            .await
            .map_err(downstream("MergeBalance"))?;
        if accounts.len() != records.len() {
            tracing::warn!(
                records = records.len(),
                accounts = accounts.len(),
                "account service returned a mismatched balance set"
            );
        }

        let mut hashes = Vec::new();
        for (record, account) in records.iter().zip(accounts) {
            if record.addr == to {
                continue;
            }
            if account.balance < self.fee_amount {
                continue;
            }
            let privkey = match self.privkey_from_record(record, &password) {
                Ok(privkey) => privkey,
                Err(e) => {
                    tracing::warn!(addr = %record.addr, error = %e, "skipping account in merge");
                    continue;
                }
            };
            let action = CoinsAction::Transfer {
                amount: account.balance - self.fee_amount,
                note: "MergeBalance".to_string(),
            };
            let payload = match action.encode() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(addr = %record.addr, error = %e, "skipping account in merge");
                    continue;
                }
            };
            let mut tx = Transaction::new(
                COINS_EXECUTOR,
                payload,
                self.fee_amount,
                to.to_string(),
                random_nonce(),
            );
            tx.sign(&privkey);
            match self.submit_to_mempool(tx.clone(), "MergeBalance").await {
                Ok(()) => hashes.push(tx.hash()),
                Err(e) => {
                    tracing::warn!(addr = %record.addr, error = %e, "merge submission rejected");
                }
            }
        }
        Ok(ReplyHashes { hashes })
    }

    async fn submit_to_mempool(
        &self,
        tx: Transaction,
        op: &'static str,
    ) -> Result<(), WalletError> {
        match self.mempool.submit(tx).await {
            Ok(()) => Ok(()),
            Err(BusError::Remote(msg)) => Err(WalletError::Mempool(msg)),
            Err(e) => Err(WalletError::Downstream {
                op,
                msg: e.to_string(),
            }),
        }
    }

    // ── tickets ──

    async fn get_tickets(&self) -> Result<ReplyWalletTickets, WalletError> {
        let password = self.status_gate().await?;
        let mut tickets = Vec::new();
        let mut privkeys = Vec::new();
        for record in self.store.accounts()? {
            let owned = self
                .chain
                .ticket_list(&record.addr)
                .await
                .map_err(downstream("GetTickets"))?;
            if owned.is_empty() {
                continue;
            }
            let privkey = self.privkey_from_record(&record, &password)?;
            privkeys.push(privkey.secret_bytes().to_vec());
            tickets.extend(owned);
        }
        if tickets.is_empty() {
            return Err(WalletError::NoTickets);
        }
        Ok(ReplyWalletTickets { tickets, privkeys })
    }

    // ── tx log ──

    fn get_tx_list(
        &self,
        from: Option<i64>,
        count: usize,
        direction: i32,
    ) -> Result<WalletTxDetails, WalletError> {
        if count == 0 || !(direction == 0 || direction == 1) {
            return Err(WalletError::InvalidInput);
        }
        let details = self.store.tx_detail_page(from, count, direction == 1)?;
        Ok(WalletTxDetails { details })
    }

    // ── key access ──

    pub(crate) fn addr_in_wallet(&self, addr: &str) -> bool {
        if addr.is_empty() {
            return false;
        }
        match self.store.get_account_by_addr(addr) {
            Ok(record) => record.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, addr, "account lookup failed");
                false
            }
        }
    }

    fn privkey_by_addr(
        &self,
        addr: &str,
        password: &str,
    ) -> Result<secp256k1::SecretKey, WalletError> {
        let record = self
            .store
            .get_account_by_addr(addr)?
            .ok_or(WalletError::AccountNotFound)?;
        self.privkey_from_record(&record, password)
    }

    fn privkey_from_record(
        &self,
        record: &AccountRecord,
        password: &str,
    ) -> Result<secp256k1::SecretKey, WalletError> {
        let bytes = hex::decode(&record.privkey).map_err(|_| KeyError::Encoding)?;
        let plain = cipher::decrypt_raw(password, &bytes)?;
        Ok(keys::privkey_from_bytes(&plain)?)
    }
}

fn random_nonce() -> i64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{AccountsHandle, ChainHandle, ConsensusHandle, MempoolHandle};

    const SEED: &str = "abandon ability able about above absent absorb abstract \
                        absurd abuse access accident account accuse achieve";

    /// A wallet whose collaborator channels are open but unserviced; fine
    /// for operations that never round-trip through a port.
    fn offline_wallet() -> (
        Wallet,
        (
            mpsc::Receiver<crate::bus::AccountRequest>,
            mpsc::Receiver<crate::bus::MempoolRequest>,
            mpsc::Receiver<crate::bus::ChainRequest>,
            mpsc::Receiver<crate::bus::ConsensusEvent>,
        ),
    ) {
        let (accounts, accounts_rx) = AccountsHandle::channel();
        let (mempool, mempool_rx) = MempoolHandle::channel();
        let (chain, chain_rx) = ChainHandle::channel();
        let (consensus, consensus_rx) = ConsensusHandle::channel();
        let wallet = Wallet::with_store(
            WalletStore::open_temporary().unwrap(),
            WalletConfig::default(),
            WalletPorts {
                accounts,
                mempool,
                chain,
                consensus,
            },
        )
        .unwrap();
        (wallet, (accounts_rx, mempool_rx, chain_rx, consensus_rx))
    }

    #[tokio::test]
    async fn fresh_wallet_reports_save_seed_first() {
        let (wallet, _rx) = offline_wallet();
        assert!(matches!(
            wallet.lock().await,
            Err(WalletError::SaveSeedFirst)
        ));
        assert!(matches!(
            wallet.unlock("pw", 0).await,
            Err(WalletError::SaveSeedFirst)
        ));
        // fresh state is locked, so the gate reports Locked first
        assert!(matches!(
            wallet.check_status().await,
            Err(WalletError::Locked)
        ));
    }

    #[tokio::test]
    async fn save_seed_then_unlock_flow() {
        let (mut wallet, _rx) = offline_wallet();
        wallet.save_seed("hunter2", SEED).await.unwrap();

        // still locked until an explicit unlock
        assert!(matches!(
            wallet.check_status().await,
            Err(WalletError::Locked)
        ));
        assert!(matches!(
            wallet.unlock("wrong", 0).await,
            Err(WalletError::BadPassword)
        ));
        wallet.unlock("hunter2", 0).await.unwrap();
        wallet.check_status().await.unwrap();

        // seed round-trips
        let reply = wallet.get_seed("hunter2").await.unwrap();
        assert_eq!(reply.seed, SEED);
        assert!(matches!(
            wallet.get_seed("wrong").await,
            Err(WalletError::BadPassword)
        ));
    }

    #[tokio::test]
    async fn save_seed_is_singleton() {
        let (mut wallet, _rx) = offline_wallet();
        wallet.save_seed("pw", SEED).await.unwrap();
        assert!(matches!(
            wallet.save_seed("pw", SEED).await,
            Err(WalletError::SeedExists)
        ));
    }

    #[tokio::test]
    async fn save_seed_validates_word_count() {
        let (mut wallet, _rx) = offline_wallet();
        assert!(matches!(
            wallet.save_seed("pw", "too few words").await,
            Err(WalletError::Mnemonic(_))
        ));
        assert!(matches!(
            wallet.save_seed("", SEED).await,
            Err(WalletError::InvalidInput)
        ));
    }

    #[tokio::test]
    async fn new_account_is_deterministic_and_single() {
        let (mut wallet, _rx) = offline_wallet();
        wallet.save_seed("pw", SEED).await.unwrap();
        wallet.unlock("pw", 0).await.unwrap();

        let account = wallet.new_account("main").await.unwrap();
        assert!(!account.account.addr.is_empty());
        assert_eq!(account.account.balance, 0);

        // same seed derives the same key; the address collides
        assert!(matches!(
            wallet.new_account("second").await,
            Err(WalletError::AddressTaken)
        ));
        assert!(matches!(
            wallet.new_account("main").await,
            Err(WalletError::LabelTaken)
        ));
    }

    #[tokio::test]
    async fn locked_wallet_refuses_key_operations() {
        let (mut wallet, _rx) = offline_wallet();
        wallet.save_seed("pw", SEED).await.unwrap();
        wallet.unlock("pw", 0).await.unwrap();
        wallet.lock().await.unwrap();
        assert!(matches!(
            wallet.new_account("main").await,
            Err(WalletError::Locked)
        ));
        assert!(matches!(
            wallet.get_seed("pw").await,
            Err(WalletError::Locked)
        ));
    }

    #[tokio::test]
    async fn password_rotation_reencrypts_records() {
        let (mut wallet, _rx) = offline_wallet();
        wallet.save_seed("old", SEED).await.unwrap();
        wallet.unlock("old", 0).await.unwrap();
        wallet.new_account("main").await.unwrap();
        let before = wallet.store.accounts().unwrap();

        wallet.set_password("old", "new").await.unwrap();

        // old password no longer unlocks
        wallet.lock().await.unwrap();
        assert!(matches!(
            wallet.unlock("old", 0).await,
            Err(WalletError::BadPassword)
        ));
        wallet.unlock("new", 0).await.unwrap();

        // the stored key decrypts under the new password to the same key
        let after = wallet.store.accounts().unwrap();
        assert_eq!(before.len(), after.len());
        assert_ne!(before[0].privkey, after[0].privkey);
        let old_key = cipher::decrypt_raw("old", &hex::decode(&before[0].privkey).unwrap()).unwrap();
        let new_key = cipher::decrypt_raw("new", &hex::decode(&after[0].privkey).unwrap()).unwrap();
        assert_eq!(old_key, new_key);

        // and the seed re-encrypted too
        assert_eq!(wallet.get_seed("new").await.unwrap().seed, SEED);
    }

    #[tokio::test]
    async fn password_rotation_rejects_wrong_old() {
        let (mut wallet, _rx) = offline_wallet();
        wallet.save_seed("old", SEED).await.unwrap();
        wallet.unlock("old", 0).await.unwrap();
        assert!(matches!(
            wallet.set_password("bogus", "new").await,
            Err(WalletError::BadPassword)
        ));
    }

    #[tokio::test]
    async fn password_rotation_skips_corrupt_records() {
        let (mut wallet, _rx) = offline_wallet();
        wallet.save_seed("old", SEED).await.unwrap();
        wallet.unlock("old", 0).await.unwrap();
        wallet.new_account("good").await.unwrap();
        wallet
            .store
            .put_account(&AccountRecord {
                addr: "corrupt-addr".into(),
                label: "bad".into(),
                privkey: "zz-not-hex".into(),
            })
            .unwrap();

        wallet.set_password("old", "new").await.unwrap();

        // the corrupt record is untouched, the good one re-encrypted
        let corrupt = wallet
            .store
            .get_account_by_addr("corrupt-addr")
            .unwrap()
            .unwrap();
        assert_eq!(corrupt.privkey, "zz-not-hex");
    }

    #[tokio::test]
    async fn set_fee_enforces_minimum() {
        let (mut wallet, _rx) = offline_wallet();
        assert!(matches!(
            wallet.set_fee(crate::constants::MIN_FEE - 1),
            Err(WalletError::InvalidInput)
        ));
        wallet.set_fee(2_000_000).unwrap();
        assert_eq!(wallet.fee_amount, 2_000_000);
        assert_eq!(wallet.store.get_fee().unwrap(), Some(2_000_000));
    }

    #[tokio::test]
    async fn gen_seed_languages() {
        let (wallet, _rx) = offline_wallet();
        let english = wallet.gen_seed(0).unwrap();
        assert_eq!(english.seed.split_whitespace().count(), 15);
        let chinese = wallet.gen_seed(1).unwrap();
        assert_eq!(chinese.seed.split_whitespace().count(), 15);
        assert!(matches!(
            wallet.gen_seed(9),
            Err(WalletError::InvalidInput)
        ));
    }

    #[tokio::test]
    async fn tx_list_validates_input() {
        let (wallet, _rx) = offline_wallet();
        assert!(matches!(
            wallet.get_tx_list(None, 0, 0),
            Err(WalletError::InvalidInput)
        ));
        assert!(matches!(
            wallet.get_tx_list(None, 10, 2),
            Err(WalletError::InvalidInput)
        ));
        assert!(wallet.get_tx_list(None, 10, 0).unwrap().details.is_empty());
    }
}
