//! Block-driven maintenance of the wallet transaction log.
//!
//! `BlockConnected` stores a [`WalletTxDetail`] for every wallet-relevant
//! `coins` transaction under its ordinal key; `BlockDisconnected` removes
//! those keys again, so a connect/disconnect pair restores the previous
//! log state. All staged writes for one block commit as a single batch.
//!
//! Ticket transactions signed by a wallet key whose receipt is `Ok` change
//! the set of keys consensus can sign with; both transitions emit a
//! `FlushTickets` notification.

use crate::chain::{
    BlockDetail, CoinsAction, ReceiptData, ReceiptStatus, Transaction, COINS_EXECUTOR,
    TICKET_EXECUTOR,
};
use crate::store::{tx_ordinal, StoreBatch, WalletTxDetail};
use crate::wallet::Wallet;

impl Wallet {
    /// Ingest a block event; `connect = false` for disconnect.
    pub(crate) async fn process_block(&self, detail: &BlockDetail, connect: bool) {
        let height = detail.block.height;
        let stride = self.config.max_tx_per_block;
        let mut batch = StoreBatch::new();
        let mut needs_flush = false;

        for (position, tx) in detail.block.txs.iter().enumerate() {
            let index = position as i64;
            if index >= stride {
                // past this point ordinals would collide with the next block
                tracing::error!(height, stride, "block exceeds ordinal stride, rest of block not indexed");
                break;
            }
            let Some(receipt) = detail.receipts.get(position) else {
                tracing::warn!(height, index, "missing receipt, rest of block not indexed");
                break;
            };
            match tx.executor.as_str() {
                COINS_EXECUTOR => {
                    self.scan_coins_tx(&mut batch, tx, receipt, height, index, connect, detail)
                }
                TICKET_EXECUTOR => {
                    if self.needs_ticket_flush(tx, receipt) {
                        needs_flush = true;
                    }
                }
                _ => {}
            }
        }

        if let Err(e) = self.store.apply(batch) {
            tracing::error!(error = %e, height, "tx-log batch commit failed");
            return;
        }
        tracing::debug!(height, connect, "block processed");
        if needs_flush {
            self.consensus.flush_tickets().await;
        }
    }

    fn scan_coins_tx(
        &self,
        batch: &mut StoreBatch,
        tx: &Transaction,
        receipt: &ReceiptData,
        height: i64,
        index: i64,
        connect: bool,
        detail: &BlockDetail,
    ) {
        let from_addr = tx.from_addr().unwrap_or_default();
        if !self.addr_in_wallet(&from_addr) && !self.addr_in_wallet(&tx.to) {
            return;
        }
        let ordinal = tx_ordinal(height, index, self.config.max_tx_per_block);
        if !connect {
            batch.del_tx_detail(ordinal);
            return;
        }

        let amount = match CoinsAction::decode(&tx.payload) {
            Ok(CoinsAction::Transfer { amount, .. }) => amount,
            Ok(CoinsAction::Withdraw { .. }) => 0,
            Err(e) => {
                tracing::warn!(height, index, error = %e, "undecodable coins payload skipped");
                return;
            }
        };
        let record = WalletTxDetail {
            tx: tx.clone(),
            receipt: receipt.clone(),
            height,
            index,
            blocktime: detail.block.block_time,
            amount,
            from_addr,
        };
        if let Err(e) = batch.put_tx_detail(ordinal, &record) {
            tracing::warn!(height, index, error = %e, "tx detail not serializable, skipped");
        }
    }

    /// A successful ticket transaction signed by one of our keys changes
    /// the usable ticket set.
    fn needs_ticket_flush(&self, tx: &Transaction, receipt: &ReceiptData) -> bool {
        if receipt.status != ReceiptStatus::Ok {
            return false;
        }
        match tx.from_addr() {
            Some(signer) => self.addr_in_wallet(&signer),
            None => false,
        }
    }
}
