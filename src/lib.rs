//! A discrete-event simulator of a permissionless proof-of-work overlay
//! network: peers exchanging transactions and blocks over a random P2P
//! graph, competitive mining driven by heterogeneous hashing power, and
//! longest-chain fork resolution.
//!
//! Proof-of-work itself is not modeled by real hashing; mining completion is
//! an exponential random timer scaled by each peer's share of hashing power,
//! matching how the reference prototype this crate formalizes behaves.

pub mod block;
pub mod config;
pub mod error;
pub mod event;
pub mod network;
pub mod peer;
pub mod simulator;
pub mod transaction;

pub use block::{Block, BlockId, BlockTreeNode};
pub use config::SimConfig;
pub use error::{Result, SimError};
pub use event::{EventQueue, SimEvent};
pub use network::{build_network, topology_stats, TopologyStats};
pub use peer::{LinkParams, Peer, PeerId};
pub use simulator::{Simulator, SummaryRow};
pub use transaction::{Transaction, TxnId};
