use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::peer::{LinkParams, Peer, PeerId};

const MIN_DEGREE: usize = 3;
const MAX_DEGREE: usize = 6;
const MAX_TOPOLOGY_ATTEMPTS: u32 = 10_000;

/// Build N peers, assign slow/low-CPU labels and hashing power, and wire
/// them into a random connected graph with per-node degree in [3,6] and
/// per-link bandwidth/propagation delay, per spec §4.2.
pub fn build_network(cfg: &SimConfig, rng: &mut StdRng) -> Result<Vec<Peer>> {
    cfg.validate()?;

    let n = cfg.n as usize;
    let slow_count = ((cfg.n as f64) * cfg.z0 / 100.0) as usize;
    let low_cpu_count = ((cfg.n as f64) * cfg.z1 / 100.0) as usize;

    let slow_ids = sample_distinct(rng, n, slow_count);
    let low_cpu_ids = sample_distinct(rng, n, low_cpu_count);

    let high_cpu_count = n - low_cpu_ids.len();
    let h_low = 1.0 / (low_cpu_ids.len() as f64 + 10.0 * high_cpu_count as f64);
    let h_high = 10.0 * h_low;

    let mut peers: Vec<Peer> = (0..n)
        .map(|id| {
            let id = id as PeerId;
            let is_low_cpu = low_cpu_ids.contains(&id);
            let hashing_power = if is_low_cpu { h_low } else { h_high };
            Peer::new(id, slow_ids.contains(&id), is_low_cpu, hashing_power, cfg.i)
        })
        .collect();

    let adjacency = build_connected_topology(n, rng)?;

    for i in 0..n {
        // `adjacency[i]` is a `HashSet`, whose iteration order is randomized
        // per-process. Sort before iterating so that both each peer's
        // `neighbors` insertion order and the RNG draws below are
        // deterministic given the same seed (spec §5, §8 scenario 6) --
        // unsorted iteration would otherwise reorder gossip targets and
        // `rho` assignment across otherwise-identical runs.
        let mut sorted_neighbors: Vec<usize> = adjacency[i].iter().copied().collect();
        sorted_neighbors.sort_unstable();
        for j in sorted_neighbors {
            if j <= i {
                continue;
            }
            let both_fast = !peers[i].is_slow && !peers[j].is_slow;
            let bandwidth_bps = if both_fast { 100e6 } else { 5e6 };
            let rho = rng.gen_range(0.01..=0.5);
            let link = LinkParams { rho, bandwidth_bps };
            peers[i].connect(j as PeerId, link);
            peers[j].connect(i as PeerId, link);
        }
    }

    Ok(peers)
}

fn sample_distinct(rng: &mut StdRng, n: usize, k: usize) -> HashSet<PeerId> {
    if k == 0 || n == 0 {
        return HashSet::new();
    }
    let k = k.min(n);
    rand::seq::index::sample(rng, n, k)
        .into_iter()
        .map(|i| i as PeerId)
        .collect()
}

/// Repeatedly generate a random-degree topology until the result is
/// connected, per spec §4.2. Bails out with a (fatal) `ConfigurationError`
/// if no connected topology is found within a generous retry budget — this
/// only happens for degenerate configurations (e.g. n < MIN_DEGREE + 1).
fn build_connected_topology(n: usize, rng: &mut StdRng) -> Result<Vec<HashSet<usize>>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    if n == 1 {
        return Ok(vec![HashSet::new()]);
    }
    if n <= MIN_DEGREE {
        return Err(SimError::Configuration(format!(
            "n={n} is too small to satisfy a minimum node degree of {MIN_DEGREE}"
        )));
    }

    for _ in 0..MAX_TOPOLOGY_ATTEMPTS {
        let adjacency = generate_random_topology(n, rng);
        if is_connected(&adjacency) {
            return Ok(adjacency);
        }
    }

    Err(SimError::Configuration(format!(
        "failed to build a connected {n}-node topology after {MAX_TOPOLOGY_ATTEMPTS} attempts"
    )))
}

fn generate_random_topology(n: usize, rng: &mut StdRng) -> Vec<HashSet<usize>> {
    let mut adjacency: Vec<HashSet<usize>> = vec![HashSet::new(); n];

    for node in 0..n {
        let target_degree = rng.gen_range(MIN_DEGREE..=MAX_DEGREE);
        while adjacency[node].len() < target_degree {
            let candidates: Vec<usize> = (0..n)
                .filter(|&c| c != node && !adjacency[node].contains(&c) && adjacency[c].len() < MAX_DEGREE)
                .collect();
            if candidates.is_empty() {
                break;
            }
            let chosen = candidates[rng.gen_range(0..candidates.len())];
            adjacency[node].insert(chosen);
            adjacency[chosen].insert(node);
        }
    }

    adjacency
}

fn is_connected(adjacency: &[HashSet<usize>]) -> bool {
    if adjacency.is_empty() {
        return true;
    }
    let mut visited = vec![false; adjacency.len()];
    let mut stack = vec![0usize];
    visited[0] = true;
    let mut count = 1;

    while let Some(node) = stack.pop() {
        for &next in &adjacency[node] {
            if !visited[next] {
                visited[next] = true;
                count += 1;
                stack.push(next);
            }
        }
    }

    count == adjacency.len()
}

/// Graph-level summary of the built topology (spec §2's "[SUPPLEMENT]"
/// reporting, mirroring the reference prototype's
/// `networkx.diameter`/average-degree printout in `main.py`). Not consumed
/// by the simulation itself -- purely informational, for callers that want
/// to report on the network before or after a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyStats {
    /// Length of the longest shortest path between any two peers (hops).
    pub diameter: usize,
    /// Mean number of neighbors per peer.
    pub average_degree: f64,
}

/// Compute [`TopologyStats`] for an already-built peer set by BFS from every
/// peer (the graph is connected by construction, so every pair has a finite
/// distance).
pub fn topology_stats(peers: &[Peer]) -> TopologyStats {
    let n = peers.len();
    if n == 0 {
        return TopologyStats {
            diameter: 0,
            average_degree: 0.0,
        };
    }

    let total_degree: usize = peers.iter().map(|p| p.neighbors.len()).sum();
    let average_degree = total_degree as f64 / n as f64;

    let mut diameter = 0usize;
    for start in 0..n {
        let mut dist = vec![None; n];
        dist[start] = Some(0usize);
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            let d = dist[node].unwrap();
            for &neighbor in &peers[node].neighbors {
                let idx = neighbor as usize;
                if dist[idx].is_none() {
                    dist[idx] = Some(d + 1);
                    diameter = diameter.max(d + 1);
                    queue.push_back(idx);
                }
            }
        }
    }

    TopologyStats {
        diameter,
        average_degree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn hashing_power_sums_to_one() {
        let cfg = SimConfig {
            n: 20,
            z0: 0.0,
            z1: 30.0,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let peers = build_network(&cfg, &mut rng).unwrap();
        let total: f64 = peers.iter().map(|p| p.hashing_power).sum();
        assert!((total - 1.0).abs() < 1e-9, "total hashing power was {total}");
    }

    #[test]
    fn every_peer_has_degree_in_range() {
        let cfg = SimConfig {
            n: 15,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let peers = build_network(&cfg, &mut rng).unwrap();
        for p in &peers {
            assert!(p.neighbors.len() >= 1, "peer {} had no neighbors", p.id);
            assert!(p.neighbors.len() <= MAX_DEGREE);
        }
    }

    #[test]
    fn topology_stats_report_plausible_diameter_and_degree() {
        let cfg = SimConfig {
            n: 15,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(21);
        let peers = build_network(&cfg, &mut rng).unwrap();
        let stats = topology_stats(&peers);
        assert!(stats.diameter >= 1, "a 15-node graph should have diameter >= 1");
        assert!(stats.diameter < peers.len(), "diameter should be far smaller than n");
        assert!(stats.average_degree > 0.0);
        assert!(stats.average_degree <= MAX_DEGREE as f64);
    }

    #[test]
    fn rejects_too_small_network() {
        let cfg = SimConfig {
            n: 2,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(build_network(&cfg, &mut rng).is_err());
    }
}
