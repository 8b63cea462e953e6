use std::collections::{HashMap, HashSet};
use std::io::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use rand::seq::IteratorRandom;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::block::{Block, BlockId, BlockTreeNode, MAX_BLOCK_SIZE_KB};
use crate::event::{EventQueue, SimEvent};
use crate::transaction::{Transaction, TxnId, BLOCK_REWARD};

/// Peer identity. An index into the arena owned by
/// [`crate::simulator::Simulator`]; events carry this, never a reference.
pub type PeerId = u32;

/// Bits per KB used uniformly for both transaction and block message sizes,
/// resolving the source ambiguity noted in spec §9.
pub const BITS_PER_KB: f64 = 8192.0;

/// Per-edge link characteristics, symmetric between both endpoints (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkParams {
    /// Propagation delay, in seconds.
    pub rho: f64,
    /// Link bandwidth, in bits per second.
    pub bandwidth_bps: f64,
}

/// The per-peer consensus state machine: mempool, block tree, longest-chain
/// tracking, balance accounting, and chain reorganization (spec §3, §4.3-4.6).
pub struct Peer {
    pub id: PeerId,
    pub is_slow: bool,
    pub is_low_cpu: bool,
    pub hashing_power: f64,
    pub target_interval: f64,

    pub neighbors: Vec<PeerId>,
    pub links: HashMap<PeerId, LinkParams>,

    pub mempool: IndexMap<TxnId, Transaction>,
    pub received_txn_ids: HashSet<TxnId>,
    pub sent_txn_targets: HashMap<TxnId, HashSet<PeerId>>,
    pub sent_block_targets: HashMap<PeerId, HashSet<BlockId>>,

    pub block_tree: HashMap<BlockId, BlockTreeNode>,
    pub orphan_pool: HashMap<BlockId, Block>,

    pub longest_chain_tip: BlockId,
    pub longest_chain_txn_ids: HashSet<TxnId>,
    pub balances: HashMap<PeerId, i64>,
    pub balance_cache: HashMap<BlockId, HashMap<PeerId, i64>>,

    /// `Some(epoch)` while a mining attempt is outstanding. Any state change
    /// that invalidates the attempt's parent clears this; the corresponding
    /// `MineComplete` event tombstones itself by comparing its saved epoch
    /// against this field when it fires (spec §5).
    current_mining_epoch: Option<u64>,
    mining_epoch_counter: u64,

    pub blocks_mined: u64,

    next_txn_seq: u64,
    next_block_seq: u64,
}

impl Peer {
    pub fn new(id: PeerId, is_slow: bool, is_low_cpu: bool, hashing_power: f64, target_interval: f64) -> Self {
        let mut block_tree = HashMap::new();
        block_tree.insert(
            BlockId::GENESIS,
            BlockTreeNode {
                block: Block::genesis(),
                parent: None,
                children: Vec::new(),
                depth: 0,
                arrival_time: 0.0,
            },
        );
        Peer {
            id,
            is_slow,
            is_low_cpu,
            hashing_power,
            target_interval,
            neighbors: Vec::new(),
            links: HashMap::new(),
            mempool: IndexMap::new(),
            received_txn_ids: HashSet::new(),
            sent_txn_targets: HashMap::new(),
            sent_block_targets: HashMap::new(),
            block_tree,
            orphan_pool: HashMap::new(),
            longest_chain_tip: BlockId::GENESIS,
            longest_chain_txn_ids: HashSet::new(),
            balances: HashMap::new(),
            balance_cache: HashMap::new(),
            current_mining_epoch: None,
            mining_epoch_counter: 0,
            blocks_mined: 0,
            next_txn_seq: 0,
            next_block_seq: 0,
        }
    }

    pub fn connect(&mut self, neighbor: PeerId, link: LinkParams) {
        self.neighbors.push(neighbor);
        self.links.insert(neighbor, link);
    }

    pub fn has_outstanding_mining_event(&self) -> bool {
        self.current_mining_epoch.is_some()
    }

    fn latency(&self, neighbor: PeerId, msg_bits: f64, rng: &mut StdRng) -> f64 {
        let link = self.links[&neighbor];
        let mean_queue_delay = 96_000.0 / link.bandwidth_bps;
        let d_queue = Exp::new(1.0 / mean_queue_delay).unwrap().sample(rng);
        link.rho + msg_bits / link.bandwidth_bps + d_queue
    }

    fn is_in_longest_chain(&self, txn_id: TxnId) -> bool {
        self.longest_chain_txn_ids.contains(&txn_id)
    }

    // ----------------------------------------------------------------
    // Transaction generation and gossip (spec §4.3)
    // ----------------------------------------------------------------

    pub fn on_generate_txn(
        &mut self,
        now: f64,
        ttx: f64,
        all_peer_ids: &[PeerId],
        rng: &mut StdRng,
        queue: &mut EventQueue,
    ) {
        let balance = *self.balances.get(&self.id).unwrap_or(&0);
        if balance > 0 {
            if let Some(&recipient) = all_peer_ids.iter().filter(|&&p| p != self.id).choose(rng) {
                let amount = rng.gen_range(1..=balance as u64);
                let seq = self.next_txn_seq;
                self.next_txn_seq += 1;
                let txn = Transaction::new(TxnId::new(self.id, seq), self.id, recipient, amount);
                self.receive_transaction(now, self.id, txn, rng, queue);
            }
        }
        let delay = Exp::new(1.0 / ttx).unwrap().sample(rng);
        queue.push(now + delay, SimEvent::GenerateTxn { peer: self.id });
    }

    pub fn receive_transaction(
        &mut self,
        now: f64,
        from: PeerId,
        txn: Transaction,
        rng: &mut StdRng,
        queue: &mut EventQueue,
    ) {
        if self.is_in_longest_chain(txn.id) {
            return;
        }
        if self.received_txn_ids.contains(&txn.id) {
            return;
        }
        self.received_txn_ids.insert(txn.id);
        self.mempool.insert(txn.id, txn.clone());

        let bits = (txn.size_kb() as f64) * BITS_PER_KB;
        for neighbor in self.neighbors.clone() {
            if neighbor == from {
                continue;
            }
            let already_sent = self
                .sent_txn_targets
                .get(&txn.id)
                .map_or(false, |s| s.contains(&neighbor));
            if already_sent {
                continue;
            }
            let latency = self.latency(neighbor, bits, rng);
            queue.push(
                now + latency,
                SimEvent::DeliverTxn {
                    target: neighbor,
                    from: self.id,
                    txn: txn.clone(),
                },
            );
            self.sent_txn_targets
                .entry(txn.id)
                .or_insert_with(HashSet::new)
                .insert(neighbor);
        }
    }

    // ----------------------------------------------------------------
    // Mining (spec §4.4)
    // ----------------------------------------------------------------

    pub fn schedule_mining(&mut self, now: f64, rng: &mut StdRng, queue: &mut EventQueue) {
        if self.has_outstanding_mining_event() {
            return;
        }

        let parent = self.longest_chain_tip;
        let mut temp_balances = self.balances.clone();

        let coinbase_seq = self.next_txn_seq;
        self.next_txn_seq += 1;
        let coinbase = Transaction::coinbase(TxnId::new(self.id, coinbase_seq), self.id);
        *temp_balances.entry(self.id).or_insert(0) += BLOCK_REWARD as i64;

        let mut included = vec![coinbase];
        for (txn_id, txn) in self.mempool.iter() {
            if self.longest_chain_txn_ids.contains(txn_id) {
                continue;
            }
            if txn.coinbase {
                *temp_balances.entry(txn.sender).or_insert(0) += txn.amount as i64;
            } else {
                let bal = *temp_balances.get(&txn.sender).unwrap_or(&0);
                if bal < txn.amount as i64 {
                    continue;
                }
                *temp_balances.entry(txn.sender).or_insert(0) -= txn.amount as i64;
                *temp_balances.entry(txn.recipient).or_insert(0) += txn.amount as i64;
            }
            included.push(txn.clone());
            if included.len() as u64 > MAX_BLOCK_SIZE_KB {
                included.pop();
                break;
            }
        }

        let block_seq = self.next_block_seq;
        self.next_block_seq += 1;
        let candidate = Block {
            id: BlockId::new(self.id, block_seq),
            parent_id: Some(parent),
            miner: self.id,
            transactions: included,
        };

        let mean_time = self.target_interval / self.hashing_power;
        let tk = Exp::new(1.0 / mean_time).unwrap().sample(rng);

        self.mining_epoch_counter += 1;
        let epoch = self.mining_epoch_counter;
        self.current_mining_epoch = Some(epoch);

        queue.push(
            now + tk,
            SimEvent::MineComplete {
                peer: self.id,
                candidate,
                epoch,
            },
        );
    }

    pub fn on_mine_complete(
        &mut self,
        now: f64,
        candidate: Block,
        epoch: u64,
        rng: &mut StdRng,
        queue: &mut EventQueue,
    ) {
        if self.current_mining_epoch != Some(epoch) {
            log::trace!("peer {} dropping stale mining event (epoch {})", self.id, epoch);
            return;
        }
        self.current_mining_epoch = None;

        let parent_id = candidate.parent_id.expect("mined blocks always have a parent");
        if !self.block_tree.contains_key(&parent_id) {
            log::debug!("peer {} mining parent {} missing, dropping", self.id, parent_id);
            return;
        }
        let depth = self.block_tree[&parent_id].depth + 1;

        self.block_tree
            .get_mut(&parent_id)
            .unwrap()
            .children
            .push(candidate.id);
        self.block_tree.insert(
            candidate.id,
            BlockTreeNode {
                block: candidate.clone(),
                parent: Some(parent_id),
                children: Vec::new(),
                depth,
                arrival_time: now,
            },
        );

        self.apply_block_forward(candidate.id);
        self.longest_chain_tip = candidate.id;
        for tx in candidate.transactions.iter().skip(1) {
            self.mempool.shift_remove(&tx.id);
        }
        self.blocks_mined += 1;

        self.broadcast_block(candidate.id, now, rng, queue);
        self.schedule_mining(now, rng, queue);
    }

    fn broadcast_block(&mut self, block_id: BlockId, now: f64, rng: &mut StdRng, queue: &mut EventQueue) {
        let block = self.block_tree[&block_id].block.clone();
        let bits = (block.size_kb() as f64) * BITS_PER_KB;
        for neighbor in self.neighbors.clone() {
            let already_sent = self
                .sent_block_targets
                .get(&neighbor)
                .map_or(false, |s| s.contains(&block_id));
            if already_sent {
                continue;
            }
            let latency = self.latency(neighbor, bits, rng);
            queue.push(
                now + latency,
                SimEvent::DeliverBlock {
                    target: neighbor,
                    from: self.id,
                    block: block.clone(),
                },
            );
            self.sent_block_targets
                .entry(neighbor)
                .or_insert_with(HashSet::new)
                .insert(block_id);
        }
    }

    // ----------------------------------------------------------------
    // Block reception and reorganization (spec §4.5)
    // ----------------------------------------------------------------

    pub fn receive_block(
        &mut self,
        now: f64,
        _from: PeerId,
        block: Block,
        rng: &mut StdRng,
        queue: &mut EventQueue,
    ) {
        if self.block_tree.contains_key(&block.id) {
            return;
        }
        let Some(parent_id) = block.parent_id else {
            return;
        };
        if !self.block_tree.contains_key(&parent_id) {
            self.orphan_pool.insert(block.id, block);
            return;
        }
        if !self.validate_block(&block) {
            log::debug!("peer {} rejected invalid block {}", self.id, block.id);
            return;
        }

        let new_depth = self.block_tree[&parent_id].depth + 1;
        let old_tip_depth = self.block_tree[&self.longest_chain_tip].depth;

        self.block_tree
            .get_mut(&parent_id)
            .unwrap()
            .children
            .push(block.id);
        self.block_tree.insert(
            block.id,
            BlockTreeNode {
                block: block.clone(),
                parent: Some(parent_id),
                children: Vec::new(),
                depth: new_depth,
                arrival_time: now,
            },
        );

        if new_depth > old_tip_depth {
            self.current_mining_epoch = None;
            if parent_id == self.longest_chain_tip {
                self.apply_block_forward(block.id);
                self.longest_chain_tip = block.id;
            } else {
                self.reorg_to(block.id);
            }
            for tx in block.transactions.iter().skip(1) {
                self.mempool.shift_remove(&tx.id);
            }
            self.schedule_mining(now, rng, queue);
        } else {
            self.cache_balances_for(block.id);
        }

        self.reattach_orphans(now, rng, queue);
        self.broadcast_block(block.id, now, rng, queue);
    }

    fn validate_block(&mut self, block: &Block) -> bool {
        if !block.is_valid_size() {
            return false;
        }
        let Some(coinbase) = block.coinbase() else {
            return false;
        };
        if !coinbase.coinbase
            || coinbase.sender != block.miner
            || coinbase.recipient != block.miner
            || coinbase.amount != BLOCK_REWARD
        {
            return false;
        }

        let parent_id = block.parent_id.expect("validated only for non-genesis blocks");
        let mut balances = self.balances_at(parent_id);
        for tx in &block.transactions {
            if tx.coinbase {
                *balances.entry(tx.sender).or_insert(0) += tx.amount as i64;
            } else {
                let bal = *balances.get(&tx.sender).unwrap_or(&0);
                if bal < tx.amount as i64 {
                    return false;
                }
                *balances.entry(tx.sender).or_insert(0) -= tx.amount as i64;
                *balances.entry(tx.recipient).or_insert(0) += tx.amount as i64;
            }
        }
        true
    }

    fn apply_block_forward(&mut self, block_id: BlockId) {
        let block = self.block_tree[&block_id].block.clone();
        for tx in &block.transactions {
            self.longest_chain_txn_ids.insert(tx.id);
            if tx.coinbase {
                *self.balances.entry(tx.sender).or_insert(0) += tx.amount as i64;
            } else {
                *self.balances.entry(tx.sender).or_insert(0) -= tx.amount as i64;
                *self.balances.entry(tx.recipient).or_insert(0) += tx.amount as i64;
            }
        }
        self.balance_cache.insert(block_id, self.balances.clone());
    }

    fn cache_balances_for(&mut self, block_id: BlockId) {
        let _ = self.balances_at(block_id);
    }

    /// Balances reachable at `block_id`, per the balance cache algorithm of
    /// spec §4.6: walk toward GENESIS until a cached (or genesis) ancestor is
    /// found, then replay forward, memoizing every intermediate block.
    fn balances_at(&mut self, block_id: BlockId) -> HashMap<PeerId, i64> {
        if let Some(cached) = self.balance_cache.get(&block_id) {
            return cached.clone();
        }

        let mut chain_segment = Vec::new();
        let mut current = block_id;
        let mut base = loop {
            if let Some(cached) = self.balance_cache.get(&current) {
                break cached.clone();
            }
            if current.is_genesis() {
                break HashMap::new();
            }
            chain_segment.push(current);
            current = self.block_tree[&current]
                .parent
                .expect("non-genesis block always has a parent");
        };
        chain_segment.reverse();

        for bid in chain_segment {
            let block = self.block_tree[&bid].block.clone();
            for tx in &block.transactions {
                if tx.coinbase {
                    *base.entry(tx.sender).or_insert(0) += tx.amount as i64;
                } else {
                    *base.entry(tx.sender).or_insert(0) -= tx.amount as i64;
                    *base.entry(tx.recipient).or_insert(0) += tx.amount as i64;
                }
            }
            self.balance_cache.insert(bid, base.clone());
        }

        base
    }

    fn find_common_ancestor(&self, a: BlockId, b: BlockId) -> BlockId {
        let mut ancestors_a = HashSet::new();
        let mut cur = a;
        loop {
            ancestors_a.insert(cur);
            if cur.is_genesis() {
                break;
            }
            cur = self.block_tree[&cur].parent.expect("non-genesis block always has a parent");
        }

        let mut cur = b;
        loop {
            if ancestors_a.contains(&cur) {
                return cur;
            }
            cur = self.block_tree[&cur].parent.expect("non-genesis block always has a parent");
        }
    }

    fn reorg_to(&mut self, new_tip: BlockId) {
        let old_tip = self.longest_chain_tip;
        let lca = self.find_common_ancestor(old_tip, new_tip);

        let mut new_branch_txn_ids: HashSet<TxnId> = HashSet::new();
        let mut cur = new_tip;
        while cur != lca {
            for tx in &self.block_tree[&cur].block.transactions {
                new_branch_txn_ids.insert(tx.id);
            }
            cur = self.block_tree[&cur].parent.expect("reached genesis before lca");
        }

        let mut restored = Vec::new();
        let mut cur = old_tip;
        while cur != lca {
            let block = self.block_tree[&cur].block.clone();
            for tx in block.transactions.into_iter().filter(|t| !t.coinbase) {
                if !new_branch_txn_ids.contains(&tx.id) {
                    restored.push(tx);
                }
            }
            cur = self.block_tree[&cur].parent.expect("reached genesis before lca");
        }
        for tx in restored {
            self.received_txn_ids.insert(tx.id);
            self.mempool.entry(tx.id).or_insert(tx);
        }
        // Every transaction on the new branch (LCA..new_tip) is now on the
        // main chain, not just the single block that triggered this reorg --
        // a reorg can jump across several already-accepted blocks at once
        // (e.g. after orphan reattachment), so sweep the whole span rather
        // than relying on the caller to remove only the newest block's txns.
        for txn_id in &new_branch_txn_ids {
            self.mempool.shift_remove(txn_id);
        }

        self.balances = self.balances_at(new_tip);

        self.longest_chain_txn_ids.clear();
        let mut cur = new_tip;
        loop {
            for tx in &self.block_tree[&cur].block.transactions {
                self.longest_chain_txn_ids.insert(tx.id);
            }
            if cur.is_genesis() {
                break;
            }
            cur = self.block_tree[&cur].parent.expect("non-genesis block always has a parent");
        }

        self.longest_chain_tip = new_tip;
    }

    fn reattach_orphans(&mut self, now: f64, rng: &mut StdRng, queue: &mut EventQueue) {
        loop {
            let mut ready: Vec<BlockId> = self
                .orphan_pool
                .iter()
                .filter(|(_, b)| b.parent_id.map_or(false, |p| self.block_tree.contains_key(&p)))
                .map(|(id, _)| *id)
                .collect();
            if ready.is_empty() {
                break;
            }
            // HashMap iteration order is randomized per-process; sort so that
            // simultaneously-reattachable orphans are always processed in the
            // same order across runs, which matters for the equal-depth
            // first-arrival tie-break in `receive_block` (spec §4.5, §8).
            ready.sort_unstable();
            for id in ready {
                if let Some(block) = self.orphan_pool.remove(&id) {
                    self.receive_block(now, self.id, block, rng, queue);
                }
            }
        }
    }

    /// Write, in chronological (GENESIS-to-tip) order, every block on this
    /// peer's longest chain and the transactions it carries. A convenience
    /// export for inspecting one peer's canonical ledger, mirroring the
    /// reference prototype's `export_included_transactions`.
    pub fn export_included_transactions(&self, path: &Path) -> std::io::Result<()> {
        let mut chain_blocks = Vec::new();
        let mut cur = self.longest_chain_tip;
        while !cur.is_genesis() {
            chain_blocks.push(cur);
            cur = self.block_tree[&cur].parent.expect("non-genesis block always has a parent");
        }
        chain_blocks.reverse();

        let mut file = std::fs::File::create(path)?;
        for block_id in chain_blocks {
            let block = &self.block_tree[&block_id].block;
            writeln!(file, "Block ID: {}, Miner: {}", block.id, block.miner)?;
            writeln!(file, "Transactions:")?;
            for txn in &block.transactions {
                writeln!(file, "    {txn}")?;
            }
            writeln!(file)?;
        }
        Ok(())
    }

    /// Count of this peer's own mined blocks retained on its longest chain,
    /// for the optional summary report (spec §6). A block is retained iff
    /// its coinbase id (unique per block) is part of the canonical set.
    pub fn retained_blocks(&self) -> u64 {
        self.block_tree
            .values()
            .filter(|n| n.block.miner == self.id)
            .filter(|n| {
                n.block
                    .coinbase()
                    .map_or(false, |cb| self.longest_chain_txn_ids.contains(&cb.id))
            })
            .count() as u64
    }
}
