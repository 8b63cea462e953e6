use serde::{Deserialize, Serialize};

use crate::peer::PeerId;
use crate::transaction::Transaction;

/// Monotonic, per-miner-scoped block identity, mirroring [`crate::transaction::TxnId`].
/// `BlockId(0)` is reserved for the synthetic GENESIS block shared by every peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(u64);

impl BlockId {
    pub const GENESIS: BlockId = BlockId(0);

    pub fn new(miner: PeerId, local_seq: u64) -> Self {
        // Offset by 1 so a miner's first block (local_seq == 0) never collides
        // with BlockId::GENESIS regardless of miner id.
        BlockId((((miner as u64) << 32) | local_seq) + 1)
    }

    pub fn is_genesis(&self) -> bool {
        *self == BlockId::GENESIS
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_genesis() {
            write!(f, "GENESIS")
        } else {
            write!(f, "block-{:x}", self.0)
        }
    }
}

/// Maximum block size in KB (1 MB), per spec §3.
pub const MAX_BLOCK_SIZE_KB: u64 = 1024;

/// An immutable block: a parent link, a miner, and an ordered transaction
/// list with the coinbase at index 0 (absent only on GENESIS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    /// `None` only for GENESIS.
    pub parent_id: Option<BlockId>,
    pub miner: PeerId,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn genesis() -> Self {
        Block {
            id: BlockId::GENESIS,
            parent_id: None,
            miner: 0,
            transactions: Vec::new(),
        }
    }

    /// Size in KB: `max(1, |transactions|)`, per spec §3. GENESIS is exempt
    /// (it is synthetic and never gossiped or size-validated).
    pub fn size_kb(&self) -> u64 {
        (self.transactions.len() as u64).max(1)
    }

    pub fn is_valid_size(&self) -> bool {
        self.size_kb() <= MAX_BLOCK_SIZE_KB
    }

    /// The coinbase transaction, always at index 0 on a non-genesis block.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }
}

/// Per-peer view of a block once accepted into that peer's tree: the block
/// itself, its parent, its children, its depth from GENESIS, and the
/// simulated time this peer first accepted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockTreeNode {
    pub block: Block,
    pub parent: Option<BlockId>,
    pub children: Vec<BlockId>,
    pub depth: u64,
    pub arrival_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_distinguishable() {
        assert!(BlockId::GENESIS.is_genesis());
        assert_eq!(BlockId::GENESIS.to_string(), "GENESIS");
        assert!(!BlockId::new(0, 0).is_genesis());
    }

    #[test]
    fn size_respects_coinbase_floor() {
        let b = Block {
            id: BlockId::new(1, 0),
            parent_id: Some(BlockId::GENESIS),
            miner: 1,
            transactions: vec![],
        };
        assert_eq!(b.size_kb(), 1);
        assert!(b.is_valid_size());
    }

    #[test]
    fn boundary_block_sizes() {
        use crate::transaction::{Transaction, TxnId};
        let mut txs = vec![Transaction::coinbase(TxnId::new(1, 0), 1)];
        for i in 0..1022 {
            txs.push(Transaction::new(TxnId::new(1, i + 1), 1, 2, 1));
        }
        let ok = Block {
            id: BlockId::new(1, 1),
            parent_id: Some(BlockId::GENESIS),
            miner: 1,
            transactions: txs.clone(),
        };
        assert_eq!(ok.size_kb(), 1023);
        assert!(ok.is_valid_size());

        txs.push(Transaction::new(TxnId::new(1, 1023), 1, 2, 1));
        let still_ok = Block {
            transactions: txs.clone(),
            ..ok.clone()
        };
        assert_eq!(still_ok.size_kb(), 1024);
        assert!(still_ok.is_valid_size());

        txs.push(Transaction::new(TxnId::new(1, 1024), 1, 2, 1));
        let too_big = Block {
            transactions: txs,
            ..ok
        };
        assert_eq!(too_big.size_kb(), 1025);
        assert!(!too_big.is_valid_size());
    }
}
