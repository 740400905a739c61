//! Historical back-fill for newly imported addresses.
//!
//! Importing a key spawns one background task that pages through the
//! blockchain service's tx-by-address index, newest first, and writes the
//! full records into the tx log. Writes use the same deterministic ordinal
//! keys as the block scanner, so overlap with live scanning converges and
//! a restarted back-fill is idempotent.

use crate::bus::{ChainHandle, ReqAddr};
use crate::store::{tx_ordinal, StoreBatch, WalletStore, WalletTxDetail};
use crate::wallet::Wallet;

impl Wallet {
    /// Start a tracked back-fill task for `addr`. The task is awaited on
    /// shutdown and runs to completion; there is no mid-stream
    /// cancellation, so a long back-fill may delay shutdown.
    pub(crate) fn spawn_catchup(&self, addr: String) {
        let store = self.store.clone();
        let chain = self.chain.clone();
        let page = self.config.max_tx_hashes_per_page;
        let stride = self.config.max_tx_per_block;
        self.tasks.spawn(backfill(store, chain, addr, page, stride));
    }
}

async fn backfill(store: WalletStore, chain: ChainHandle, addr: String, page: i64, stride: i64) {
    // cursor is the oldest (height, index) of the previous page; None means
    // "start from the newest transaction"
    let mut cursor: Option<(i64, i64)> = None;
    loop {
        let req = ReqAddr {
            addr: addr.clone(),
            flag: 0,
            count: page as i32,
            direction: 0,
            height: cursor.map_or(-1, |(height, _)| height),
            index: cursor.map_or(0, |(_, index)| index),
        };
        let infos = match chain.txs_by_addr(req).await {
            Ok(infos) => infos,
            Err(e) => {
                tracing::warn!(addr = %addr, error = %e, "catch-up page query failed");
                return;
            }
        };
        if infos.is_empty() {
            break;
        }

        let hashes = infos.iter().map(|info| info.hash).collect();
        let details = match chain.tx_details(hashes).await {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(addr = %addr, error = %e, "catch-up detail fetch failed");
                return;
            }
        };

        let mut batch = StoreBatch::new();
        for detail in details {
            let ordinal = tx_ordinal(detail.height, detail.index, stride);
            let record = WalletTxDetail {
                tx: detail.tx,
                receipt: detail.receipt,
                height: detail.height,
                index: detail.index,
                blocktime: detail.blocktime,
                amount: detail.amount,
                from_addr: detail.from_addr,
            };
            if let Err(e) = batch.put_tx_detail(ordinal, &record) {
                tracing::warn!(addr = %addr, ordinal, error = %e, "catch-up record not serializable, skipped");
            }
        }
        if let Err(e) = store.apply(batch) {
            tracing::error!(addr = %addr, error = %e, "catch-up batch commit failed");
            return;
        }

        let fetched = infos.len();
        // the response is newest-first; its last entry is the next cursor
        if let Some(last) = infos.last() {
            cursor = Some((last.height, last.index));
        }
        tracing::debug!(addr = %addr, fetched, "catch-up page stored");
        if (fetched as i64) < page {
            break;
        }
    }
    tracing::info!(addr = %addr, "catch-up complete");
}
