//! Property-based tests for the simulator's core invariants (spec §8).
//!
//! These complement the scenario tests in `tests/scenarios.rs` by checking
//! that invariants hold across randomly generated configurations and
//! transaction amounts, rather than a handful of hand-picked cases.

use netsim_core::{SimConfig, Simulator};
use proptest::prelude::*;

proptest! {
    /// For any valid config, every peer's longest-chain balances stay
    /// non-negative and the total coin supply always equals 50 times the
    /// number of blocks on that peer's longest chain (spec §8).
    #[test]
    fn longest_chain_invariants_hold_across_configs(
        n in 4u32..16,
        z0 in 0.0f64..80.0,
        z1 in 0.0f64..80.0,
        ttx in 1.0f64..20.0,
        interval in 5.0f64..100.0,
        seed in any::<u64>(),
    ) {
        let cfg = SimConfig {
            n,
            z0,
            z1,
            ttx,
            i: interval,
            max_time: 3_000.0,
            seed,
        };
        let Ok(mut sim) = Simulator::new(&cfg) else {
            // A degenerate (n, z0, z1) combination may legitimately fail
            // the connected-topology builder (spec §7's fatal
            // ConfigurationError); that is not a property violation.
            return Ok(());
        };
        sim.run();

        for peer in sim.peers() {
            let tip_depth = peer.block_tree[&peer.longest_chain_tip].depth;
            let total: i64 = peer.balances.values().sum();
            prop_assert_eq!(total, 50 * tip_depth as i64);
            for &bal in peer.balances.values() {
                prop_assert!(bal >= 0);
            }
        }
    }

    /// Hashing power assigned by the network builder always sums to 1 and
    /// every individual share stays within (0, 1], regardless of the
    /// slow/low-CPU split (spec §4.2).
    #[test]
    fn hashing_power_always_sums_to_one(
        n in 4u32..40,
        z1 in 0.0f64..100.0,
        seed in any::<u64>(),
    ) {
        let cfg = SimConfig {
            n,
            z0: 0.0,
            z1,
            ttx: 5.0,
            i: 50.0,
            max_time: 0.0,
            seed,
        };
        let Ok(peers) = (|| {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);
            netsim_core::build_network(&cfg, &mut rng)
        })() else {
            return Ok(());
        };
        let total: f64 = peers.iter().map(|p| p.hashing_power).sum();
        prop_assert!((total - 1.0).abs() < 1e-6);
        for p in &peers {
            prop_assert!(p.hashing_power > 0.0 && p.hashing_power <= 1.0);
        }
    }
}
