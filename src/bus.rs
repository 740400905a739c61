//! Typed message-bus surface of the wallet.
//!
//! Other node components talk to the wallet through a [`WalletHandle`]; each
//! request variant carries a oneshot reply sender, and block events are
//! fire-and-forget. In the other direction, the wallet reaches its
//! collaborators — account service, mempool, blockchain, consensus —
//! through the port handles defined here; the node (or a test harness)
//! services the paired receivers.

use tokio::sync::{mpsc, oneshot};

use crate::chain::{Account, BlockDetail, Ticket, Transaction, TxDetail, TxInfo};
use crate::store::WalletTxDetail;
use crate::wallet::WalletError;
use crate::Hash;

/// Depth of the request channels created by the `channel()` constructors.
pub const CHANNEL_DEPTH: usize = 64;

/// Reply sender embedded in each request variant.
pub type Reply<T> = oneshot::Sender<Result<T, WalletError>>;

/// One wallet account in a listing reply.
#[derive(Clone, Debug)]
pub struct WalletAccount {
    pub account: Account,
    pub label: String,
}

/// Reply to `GetAccountList`.
#[derive(Clone, Debug)]
pub struct WalletAccounts {
    pub wallets: Vec<WalletAccount>,
}

/// Reply carrying a submitted transaction hash.
#[derive(Clone, Debug)]
pub struct ReplyHash {
    pub hash: Hash,
}

/// Reply carrying the hashes that succeeded in a batch submission.
#[derive(Clone, Debug)]
pub struct ReplyHashes {
    pub hashes: Vec<Hash>,
}

/// Reply carrying a seed phrase.
#[derive(Clone, Debug)]
pub struct ReplySeed {
    pub seed: String,
}

/// Reply to `GetTickets`: the wallet's tickets and the raw private keys
/// consensus signs with.
#[derive(Clone, Debug)]
pub struct ReplyWalletTickets {
    pub tickets: Vec<Ticket>,
    pub privkeys: Vec<Vec<u8>>,
}

/// Reply to `GetTxList`.
#[derive(Clone, Debug)]
pub struct WalletTxDetails {
    pub details: Vec<WalletTxDetail>,
}

/// Requests routed through the wallet dispatcher.
pub enum WalletRequest {
    GetAccountList {
        reply: Reply<WalletAccounts>,
    },
    NewAccount {
        label: String,
        reply: Reply<WalletAccount>,
    },
    ImportPrivKey {
        label: String,
        privkey: String,
        reply: Reply<WalletAccount>,
    },
    SendToAddress {
        from: String,
        to: String,
        amount: i64,
        note: String,
        reply: Reply<ReplyHash>,
    },
    MergeBalance {
        to: String,
        reply: Reply<ReplyHashes>,
    },
    SetFee {
        amount: i64,
        reply: Reply<()>,
    },
    SetLabel {
        addr: String,
        label: String,
        reply: Reply<WalletAccount>,
    },
    SetPassword {
        old: String,
        new: String,
        reply: Reply<()>,
    },
    Lock {
        reply: Reply<()>,
    },
    Unlock {
        password: String,
        timeout_secs: i64,
        reply: Reply<()>,
    },
    GenSeed {
        lang: i32,
        reply: Reply<ReplySeed>,
    },
    GetSeed {
        password: String,
        reply: Reply<ReplySeed>,
    },
    SaveSeed {
        password: String,
        seed: String,
        reply: Reply<()>,
    },
    GetWalletStatus {
        reply: Reply<()>,
    },
    GetTickets {
        reply: Reply<ReplyWalletTickets>,
    },
    GetTxList {
        from: Option<i64>,
        count: usize,
        direction: i32,
        reply: Reply<WalletTxDetails>,
    },
    BlockConnected(Box<BlockDetail>),
    BlockDisconnected(Box<BlockDetail>),
}

/// Create the wallet request channel: the handle goes to the node's other
/// components, the receiver to [`crate::wallet::Wallet::run`].
pub fn wallet_channel() -> (WalletHandle, mpsc::Receiver<WalletRequest>) {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    (WalletHandle { tx }, rx)
}

/// Cloneable sender side of the wallet dispatcher.
#[derive(Clone)]
pub struct WalletHandle {
    tx: mpsc::Sender<WalletRequest>,
}

impl WalletHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> WalletRequest,
    ) -> Result<T, WalletError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| WalletError::Shutdown)?;
        rx.await.map_err(|_| WalletError::Shutdown)?
    }

    pub async fn get_account_list(&self) -> Result<WalletAccounts, WalletError> {
        self.request(|reply| WalletRequest::GetAccountList { reply })
            .await
    }

    pub async fn new_account(&self, label: &str) -> Result<WalletAccount, WalletError> {
        let label = label.to_string();
        self.request(|reply| WalletRequest::NewAccount { label, reply })
            .await
    }

    pub async fn import_privkey(
        &self,
        label: &str,
        privkey: &str,
    ) -> Result<WalletAccount, WalletError> {
        let (label, privkey) = (label.to_string(), privkey.to_string());
        self.request(|reply| WalletRequest::ImportPrivKey {
            label,
            privkey,
            reply,
        })
        .await
    }

    pub async fn send_to_address(
        &self,
        from: &str,
        to: &str,
        amount: i64,
        note: &str,
    ) -> Result<ReplyHash, WalletError> {
        let (from, to, note) = (from.to_string(), to.to_string(), note.to_string());
        self.request(|reply| WalletRequest::SendToAddress {
            from,
            to,
            amount,
            note,
            reply,
        })
        .await
    }

    pub async fn merge_balance(&self, to: &str) -> Result<ReplyHashes, WalletError> {
        let to = to.to_string();
        self.request(|reply| WalletRequest::MergeBalance { to, reply })
            .await
    }

    pub async fn set_fee(&self, amount: i64) -> Result<(), WalletError> {
        self.request(|reply| WalletRequest::SetFee { amount, reply })
            .await
    }

    pub async fn set_label(&self, addr: &str, label: &str) -> Result<WalletAccount, WalletError> {
        let (addr, label) = (addr.to_string(), label.to_string());
        self.request(|reply| WalletRequest::SetLabel { addr, label, reply })
            .await
    }

    pub async fn set_password(&self, old: &str, new: &str) -> Result<(), WalletError> {
        let (old, new) = (old.to_string(), new.to_string());
        self.request(|reply| WalletRequest::SetPassword { old, new, reply })
            .await
    }

    pub async fn lock(&self) -> Result<(), WalletError> {
        self.request(|reply| WalletRequest::Lock { reply }).await
    }

    pub async fn unlock(&self, password: &str, timeout_secs: i64) -> Result<(), WalletError> {
        let password = password.to_string();
        self.request(|reply| WalletRequest::Unlock {
            password,
            timeout_secs,
            reply,
        })
        .await
    }

    pub async fn gen_seed(&self, lang: i32) -> Result<ReplySeed, WalletError> {
        self.request(|reply| WalletRequest::GenSeed { lang, reply })
            .await
    }

    pub async fn get_seed(&self, password: &str) -> Result<ReplySeed, WalletError> {
        let password = password.to_string();
        self.request(|reply| WalletRequest::GetSeed { password, reply })
            .await
    }

    pub async fn save_seed(&self, password: &str, seed: &str) -> Result<(), WalletError> {
        let (password, seed) = (password.to_string(), seed.to_string());
        self.request(|reply| WalletRequest::SaveSeed {
            password,
            seed,
            reply,
        })
        .await
    }

    pub async fn get_wallet_status(&self) -> Result<(), WalletError> {
        self.request(|reply| WalletRequest::GetWalletStatus { reply })
            .await
    }

    pub async fn get_tickets(&self) -> Result<ReplyWalletTickets, WalletError> {
        self.request(|reply| WalletRequest::GetTickets { reply })
            .await
    }

    pub async fn get_tx_list(
        &self,
        from: Option<i64>,
        count: usize,
        direction: i32,
    ) -> Result<WalletTxDetails, WalletError> {
        self.request(|reply| WalletRequest::GetTxList {
            from,
            count,
            direction,
            reply,
        })
        .await
    }

    /// Deliver a block-connected event. Fire-and-forget.
    pub async fn block_connected(&self, detail: BlockDetail) -> Result<(), WalletError> {
        self.tx
            .send(WalletRequest::BlockConnected(Box::new(detail)))
            .await
            .map_err(|_| WalletError::Shutdown)
    }

    /// Deliver a block-disconnected event. Fire-and-forget.
    pub async fn block_disconnected(&self, detail: BlockDetail) -> Result<(), WalletError> {
        self.tx
            .send(WalletRequest::BlockDisconnected(Box::new(detail)))
            .await
            .map_err(|_| WalletError::Shutdown)
    }
}

// ── collaborator ports ──

/// Failure talking to a collaborator.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BusError {
    #[error("collaborator channel closed")]
    Closed,
    #[error("{0}")]
    Remote(String),
}

/// Requests the wallet issues to the account service.
pub enum AccountRequest {
    LoadAccounts {
        addrs: Vec<String>,
        reply: oneshot::Sender<Result<Vec<Account>, String>>,
    },
}

/// Port to the account/balance service.
#[derive(Clone)]
pub struct AccountsHandle {
    tx: mpsc::Sender<AccountRequest>,
}

impl AccountsHandle {
    pub fn channel() -> (Self, mpsc::Receiver<AccountRequest>) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        (AccountsHandle { tx }, rx)
    }

    /// On-chain balance records for the given addresses, index-aligned with
    /// the input.
    pub async fn load_accounts(&self, addrs: Vec<String>) -> Result<Vec<Account>, BusError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(AccountRequest::LoadAccounts { addrs, reply: tx })
            .await
            .map_err(|_| BusError::Closed)?;
        rx.await
            .map_err(|_| BusError::Closed)?
            .map_err(BusError::Remote)
    }
}

/// Requests the wallet issues to the mempool.
pub enum MempoolRequest {
    Submit {
        tx: Transaction,
        reply: oneshot::Sender<Result<(), String>>,
    },
}

/// Port to the mempool admission service.
#[derive(Clone)]
pub struct MempoolHandle {
    tx: mpsc::Sender<MempoolRequest>,
}

impl MempoolHandle {
    pub fn channel() -> (Self, mpsc::Receiver<MempoolRequest>) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        (MempoolHandle { tx }, rx)
    }

    /// Submit a signed transaction; `Err(Remote)` carries the rejection
    /// message.
    pub async fn submit(&self, transaction: Transaction) -> Result<(), BusError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(MempoolRequest::Submit {
                tx: transaction,
                reply: tx,
            })
            .await
            .map_err(|_| BusError::Closed)?;
        rx.await
            .map_err(|_| BusError::Closed)?
            .map_err(BusError::Remote)
    }
}

/// Cursor for paginated tx-by-address queries. `height = -1` means "from
/// the newest transaction".
#[derive(Clone, Debug)]
pub struct ReqAddr {
    pub addr: String,
    pub flag: i32,
    pub count: i32,
    pub direction: i32,
    pub height: i64,
    pub index: i64,
}

/// Requests the wallet issues to the blockchain history service.
pub enum ChainRequest {
    TxsByAddr {
        req: ReqAddr,
        reply: oneshot::Sender<Result<Vec<TxInfo>, String>>,
    },
    TxDetails {
        hashes: Vec<Hash>,
        reply: oneshot::Sender<Result<Vec<TxDetail>, String>>,
    },
    TicketList {
        addr: String,
        reply: oneshot::Sender<Result<Vec<Ticket>, String>>,
    },
}

/// Port to the blockchain history service.
#[derive(Clone)]
pub struct ChainHandle {
    tx: mpsc::Sender<ChainRequest>,
}

impl ChainHandle {
    pub fn channel() -> (Self, mpsc::Receiver<ChainRequest>) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        (ChainHandle { tx }, rx)
    }

    pub async fn txs_by_addr(&self, req: ReqAddr) -> Result<Vec<TxInfo>, BusError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ChainRequest::TxsByAddr { req, reply: tx })
            .await
            .map_err(|_| BusError::Closed)?;
        rx.await
            .map_err(|_| BusError::Closed)?
            .map_err(BusError::Remote)
    }

    pub async fn tx_details(&self, hashes: Vec<Hash>) -> Result<Vec<TxDetail>, BusError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ChainRequest::TxDetails { hashes, reply: tx })
            .await
            .map_err(|_| BusError::Closed)?;
        rx.await
            .map_err(|_| BusError::Closed)?
            .map_err(BusError::Remote)
    }

    pub async fn ticket_list(&self, addr: &str) -> Result<Vec<Ticket>, BusError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ChainRequest::TicketList {
                addr: addr.to_string(),
                reply: tx,
            })
            .await
            .map_err(|_| BusError::Closed)?;
        rx.await
            .map_err(|_| BusError::Closed)?
            .map_err(BusError::Remote)
    }
}

/// Notifications the wallet pushes to the consensus layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsensusEvent {
    /// The set of ticket-bearing wallet keys changed; consensus should
    /// re-read it.
    FlushTickets,
}

/// Port to the consensus layer. Events are fire-and-forget.
#[derive(Clone)]
pub struct ConsensusHandle {
    tx: mpsc::Sender<ConsensusEvent>,
}

impl ConsensusHandle {
    pub fn channel() -> (Self, mpsc::Receiver<ConsensusEvent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        (ConsensusHandle { tx }, rx)
    }

    pub async fn flush_tickets(&self) {
        if self.tx.send(ConsensusEvent::FlushTickets).await.is_err() {
            tracing::debug!("consensus channel closed, dropping ticket flush");
        }
    }
}
