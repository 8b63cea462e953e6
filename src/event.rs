use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::block::Block;
use crate::peer::PeerId;
use crate::transaction::Transaction;

/// The tagged-variant callback dispatched by [`crate::simulator::Simulator`].
/// Modeling events as a value type (rather than boxed closures) keeps the
/// queue serializable for debugging/replay and keeps peer-to-peer references
/// as plain [`PeerId`]s, per spec §9.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// Recurring per-peer transaction generator tick.
    GenerateTxn { peer: PeerId },
    /// Delivery of a gossiped transaction from `from` to `target`.
    DeliverTxn {
        target: PeerId,
        from: PeerId,
        txn: Transaction,
    },
    /// A peer's mining timer has fired with a candidate block. `epoch`
    /// tombstones the attempt: if it no longer matches the peer's current
    /// mining epoch, the event is stale and is dropped on fire (spec §5).
    MineComplete {
        peer: PeerId,
        candidate: Block,
        epoch: u64,
    },
    /// Delivery of a gossiped block from `from` to `target`.
    DeliverBlock {
        target: PeerId,
        from: PeerId,
        block: Block,
    },
}

#[derive(Debug, Clone)]
struct QueuedEvent {
    time: f64,
    seq: u64,
    event: SimEvent,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest (timestamp, seq)
        // pair sits at the top, giving us a min-heap with a stable,
        // insertion-order tie-break as required by spec §4.1.
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A priority queue of scheduled events, ordered by `(timestamp, insertion
/// sequence)` ascending. The stable tie-break is what makes two runs with an
/// identical seed and config byte-identical (spec §4.1, §5).
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn push(&mut self, time: f64, event: SimEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedEvent { time, seq, event });
    }

    pub fn pop_min(&mut self) -> Option<(f64, SimEvent)> {
        self.heap.pop().map(|qe| (qe.time, qe.event))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer_event(peer: PeerId) -> SimEvent {
        SimEvent::GenerateTxn { peer }
    }

    #[test]
    fn pops_in_timestamp_order() {
        let mut q = EventQueue::new();
        q.push(3.0, peer_event(0));
        q.push(1.0, peer_event(1));
        q.push(2.0, peer_event(2));
        let order: Vec<f64> = std::iter::from_fn(|| q.pop_min()).map(|(t, _)| t).collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut q = EventQueue::new();
        q.push(5.0, peer_event(10));
        q.push(5.0, peer_event(20));
        q.push(5.0, peer_event(30));
        let peers: Vec<PeerId> = std::iter::from_fn(|| q.pop_min())
            .map(|(_, e)| match e {
                SimEvent::GenerateTxn { peer } => peer,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(peers, vec![10, 20, 30]);
    }
}
