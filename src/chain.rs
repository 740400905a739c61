//! On-chain types shared with the wallet's collaborators.
//!
//! These mirror the wire shapes produced by the blockchain, mempool, and
//! account services: transactions with detached SECP256K1 signatures,
//! block/receipt pairs delivered on connect/disconnect, and the ticket and
//! account records returned by queries. Payloads of the `coins` executor
//! decode to [`CoinsAction`].

use serde::{Deserialize, Serialize};

use crate::crypto::keys;
use crate::{hash_concat, Hash};

/// Executor name of the native coin transfer contract.
pub const COINS_EXECUTOR: &str = "coins";
/// Executor name of the consensus ticket contract.
pub const TICKET_EXECUTOR: &str = "ticket";

/// Signature scheme tag carried in [`TxSignature`].
pub const SIG_SECP256K1: u32 = 1;

/// Action carried in the payload of a `coins` transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinsAction {
    /// Move `amount` to the transaction's `to` address.
    Transfer { amount: i64, note: String },
    /// Withdraw `amount` from an executor back to the owner.
    Withdraw { amount: i64, note: String },
}

impl CoinsAction {
    /// Encode for use as a transaction payload.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError(e.to_string()))
    }

    /// Decode a `coins` transaction payload.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(payload).map_err(|e| CodecError(e.to_string()))
    }
}

/// Payload encode/decode failure.
#[derive(Clone, Debug, thiserror::Error)]
#[error("codec error: {0}")]
pub struct CodecError(pub String);

/// Detached signature over a transaction's signing bytes.
///
/// Carries the compressed public key of the signer, so the sender address
/// can be recovered from the transaction alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub ty: u32,
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A transaction as submitted to the mempool and included in blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Executor the payload is addressed to (`coins`, `ticket`, ...).
    pub executor: String,
    /// Executor-specific action encoding.
    pub payload: Vec<u8>,
    pub fee: i64,
    pub to: String,
    pub nonce: i64,
    pub signature: Option<TxSignature>,
}

impl Transaction {
    /// Create an unsigned transaction.
    pub fn new(executor: &str, payload: Vec<u8>, fee: i64, to: String, nonce: i64) -> Self {
        Transaction {
            executor: executor.to_string(),
            payload,
            fee,
            to,
            nonce,
            signature: None,
        }
    }

    /// Bytes covered by the signature: everything except the signature itself.
    fn signing_digest(&self) -> Hash {
        hash_concat(&[
            self.executor.as_bytes(),
            &self.payload,
            &self.fee.to_le_bytes(),
            self.to.as_bytes(),
            &self.nonce.to_le_bytes(),
        ])
    }

    /// Sign with a SECP256K1 private key, attaching the signer's pubkey.
    pub fn sign(&mut self, privkey: &secp256k1::SecretKey) {
        let (pubkey, signature) = keys::sign_digest(privkey, &self.signing_digest());
        self.signature = Some(TxSignature {
            ty: SIG_SECP256K1,
            pubkey,
            signature,
        });
    }

    /// Verify the attached signature against the signing bytes.
    pub fn verify(&self) -> bool {
        match &self.signature {
            Some(sig) if sig.ty == SIG_SECP256K1 => {
                keys::verify_digest(&sig.pubkey, &self.signing_digest(), &sig.signature)
            }
            _ => false,
        }
    }

    /// Transaction hash, covering the signature when present.
    pub fn hash(&self) -> Hash {
        let digest = self.signing_digest();
        match &self.signature {
            Some(sig) => hash_concat(&[&digest, &sig.pubkey, &sig.signature]),
            None => digest,
        }
    }

    /// Address of the signer, derived from the signature's public key.
    pub fn from_addr(&self) -> Option<String> {
        self.signature
            .as_ref()
            .map(|sig| keys::pubkey_to_address(&sig.pubkey))
    }
}

/// Execution outcome of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Ok,
    Failed,
}

/// Receipt delivered alongside a block for each transaction in it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceiptData {
    pub status: ReceiptStatus,
}

/// A block body as delivered by the blockchain service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub height: i64,
    pub block_time: i64,
    pub txs: Vec<Transaction>,
}

/// Block plus per-transaction receipts, as carried by connect/disconnect
/// events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDetail {
    pub block: Block,
    pub receipts: Vec<ReceiptData>,
}

/// On-chain balance record returned by the account service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Account {
    pub currency: i32,
    pub balance: i64,
    pub frozen: i64,
    pub addr: String,
}

/// A consensus stake ticket bound to a wallet address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub addr: String,
    pub status: i32,
}

/// Position of a transaction as reported by tx-by-address queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxInfo {
    pub hash: Hash,
    pub height: i64,
    pub index: i64,
}

/// Full transaction record returned by the blockchain service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxDetail {
    pub tx: Transaction,
    pub receipt: ReceiptData,
    pub height: i64,
    pub index: i64,
    pub blocktime: i64,
    pub amount: i64,
    pub from_addr: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys;

    fn transfer_tx(sk: &secp256k1::SecretKey, to: &str, amount: i64) -> Transaction {
        let action = CoinsAction::Transfer {
            amount,
            note: "test".into(),
        };
        let mut tx = Transaction::new(
            COINS_EXECUTOR,
            action.encode().unwrap(),
            1_000_000,
            to.into(),
            42,
        );
        tx.sign(sk);
        tx
    }

    #[test]
    fn coins_action_roundtrip() {
        let action = CoinsAction::Withdraw {
            amount: 77,
            note: "w".into(),
        };
        let decoded = CoinsAction::decode(&action.encode().unwrap()).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn coins_action_rejects_garbage() {
        assert!(CoinsAction::decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn sign_and_verify() {
        let sk = keys::generate_privkey();
        let tx = transfer_tx(&sk, "addr-to", 10);
        assert!(tx.verify());
    }

    #[test]
    fn tampered_tx_fails_verification() {
        let sk = keys::generate_privkey();
        let mut tx = transfer_tx(&sk, "addr-to", 10);
        tx.fee += 1;
        assert!(!tx.verify());
    }

    #[test]
    fn unsigned_tx_does_not_verify() {
        let tx = Transaction::new(COINS_EXECUTOR, vec![], 0, "x".into(), 1);
        assert!(!tx.verify());
        assert!(tx.from_addr().is_none());
    }

    #[test]
    fn from_addr_matches_signer() {
        let sk = keys::generate_privkey();
        let expected = keys::pubkey_to_address(&keys::pubkey_bytes(&sk));
        let tx = transfer_tx(&sk, "addr-to", 10);
        assert_eq!(tx.from_addr().unwrap(), expected);
    }

    #[test]
    fn hash_covers_signature() {
        let sk = keys::generate_privkey();
        let mut tx = transfer_tx(&sk, "addr-to", 10);
        let signed = tx.hash();
        tx.signature = None;
        assert_ne!(signed, tx.hash());
    }
}
