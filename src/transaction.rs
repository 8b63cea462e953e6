use serde::{Deserialize, Serialize};

use crate::peer::PeerId;

/// Monotonic, per-miner-scoped transaction identity. Encoded as
/// `(origin_peer << 32) | local_sequence` rather than a random UUID so that
/// two runs with the same seed assign identical ids without needing a
/// globally shared counter threaded through the peer arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId(u64);

impl TxnId {
    pub fn new(origin: PeerId, local_seq: u64) -> Self {
        TxnId(((origin as u64) << 32) | local_seq)
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{:x}", self.0)
    }
}

/// Fixed wire size of a transaction, in KB, per spec §3.
pub const TXN_SIZE_KB: u64 = 1;

/// Block reward credited to a coinbase transaction's recipient, per spec §3.
pub const BLOCK_REWARD: u64 = 50;

/// An immutable transaction: a balance transfer between two peers, or a
/// coinbase mint (sender == recipient == miner, amount fixed to
/// [`BLOCK_REWARD`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxnId,
    pub sender: PeerId,
    pub recipient: PeerId,
    pub amount: u64,
    pub coinbase: bool,
}

impl Transaction {
    pub fn new(id: TxnId, sender: PeerId, recipient: PeerId, amount: u64) -> Self {
        Transaction {
            id,
            sender,
            recipient,
            amount,
            coinbase: false,
        }
    }

    pub fn coinbase(id: TxnId, miner: PeerId) -> Self {
        Transaction {
            id,
            sender: miner,
            recipient: miner,
            amount: BLOCK_REWARD,
            coinbase: true,
        }
    }

    pub fn size_kb(&self) -> u64 {
        TXN_SIZE_KB
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.coinbase {
            write!(f, "{} (coinbase): {} coins minted to {}", self.id, self.amount, self.recipient)
        } else {
            write!(f, "{}: {} -> {} ({} coins)", self.id, self.sender, self.recipient, self.amount)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coinbase_self_pays_reward() {
        let tx = Transaction::coinbase(TxnId::new(3, 0), 3);
        assert!(tx.coinbase);
        assert_eq!(tx.sender, tx.recipient);
        assert_eq!(tx.amount, BLOCK_REWARD);
    }

    #[test]
    fn ids_are_deterministic_per_origin() {
        let a = TxnId::new(1, 5);
        let b = TxnId::new(1, 5);
        let c = TxnId::new(2, 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
