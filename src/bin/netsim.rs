use std::path::PathBuf;

use clap::Parser;
use netsim_core::{Result, SimConfig, Simulator};

#[derive(Parser)]
#[command(name = "netsim")]
#[command(about = "Discrete-event simulator for a longest-chain P2P network")]
struct Cli {
    /// Number of peers.
    #[arg(long, default_value_t = SimConfig::default().n)]
    n: u32,

    /// Percent of peers with slow links, 0-100.
    #[arg(long, default_value_t = SimConfig::default().z0)]
    z0: f64,

    /// Percent of peers with low hashing power, 0-100.
    #[arg(long, default_value_t = SimConfig::default().z1)]
    z1: f64,

    /// Mean transaction interarrival time, in seconds.
    #[arg(long, default_value_t = SimConfig::default().ttx)]
    ttx: f64,

    /// Target block interval, in seconds.
    #[arg(long, default_value_t = SimConfig::default().i)]
    i: f64,

    /// Simulated-time horizon, in seconds.
    #[arg(long, default_value_t = SimConfig::default().max_time)]
    max_time: f64,

    /// RNG seed.
    #[arg(long, default_value_t = SimConfig::default().seed)]
    seed: u64,

    /// Directory to write per-peer block logs and the summary report into.
    #[arg(long, default_value = "./netsim-out")]
    out_dir: PathBuf,

    /// Load a config from a JSON file instead of the flags above.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip writing per-peer block logs; only print the summary report.
    #[arg(long)]
    no_logs: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .map_err(|e| netsim_core::SimError::Configuration(format!("reading {path:?}: {e}")))?;
            serde_json::from_str(&data)
                .map_err(|e| netsim_core::SimError::Configuration(format!("parsing {path:?}: {e}")))?
        }
        None => SimConfig {
            n: cli.n,
            z0: cli.z0,
            z1: cli.z1,
            ttx: cli.ttx,
            i: cli.i,
            max_time: cli.max_time,
            seed: cli.seed,
        },
    };
    cfg.validate()?;

    log::info!(
        "starting simulation: n={} z0={} z1={} ttx={} i={} max_time={} seed={}",
        cfg.n, cfg.z0, cfg.z1, cfg.ttx, cfg.i, cfg.max_time, cfg.seed
    );

    let mut sim = Simulator::new(&cfg)?;
    let topology = sim.topology_stats();
    println!("Network diameter: {}", topology.diameter);
    println!("Average degree: {:.2}", topology.average_degree);

    sim.run();

    if !cli.no_logs {
        sim.write_peer_logs(&cli.out_dir)
            .map_err(|e| netsim_core::SimError::Configuration(format!("writing logs to {:?}: {e}", cli.out_dir)))?;
        log::info!("wrote per-peer block logs to {:?}", cli.out_dir);

        if let Some(peer0) = sim.peers().first() {
            let path = cli.out_dir.join("peer0_transactions.txt");
            peer0.export_included_transactions(&path).map_err(|e| {
                netsim_core::SimError::Configuration(format!("writing {path:?}: {e}"))
            })?;
        }
    }

    println!("{:<8}{:<12}{:<10}{:<14}{:<16}{:<10}", "peer", "hashing", "low_cpu", "mined", "retained", "ratio");
    for row in sim.summary() {
        println!(
            "{:<8}{:<12.6}{:<10}{:<14}{:<16}{:<10.3}",
            row.peer_id,
            row.hashing_power,
            row.is_low_cpu,
            row.blocks_mined,
            row.blocks_retained,
            row.retention_ratio(),
        );
    }

    Ok(())
}
