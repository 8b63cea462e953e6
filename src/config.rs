use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Configuration consumed by the simulation core, per spec §6. Defaults
/// mirror the constants the original Python prototype (`main.py`) used for
/// its reference run: n=50, z0=25, z1=20, Ttx=5s, I=600s, max_time=100000s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of peers.
    pub n: u32,
    /// Percent of peers with slow links, 0-100.
    pub z0: f64,
    /// Percent of peers with low CPU (hashing power), 0-100.
    pub z1: f64,
    /// Mean transaction interarrival time, in seconds.
    pub ttx: f64,
    /// Target block interval, in seconds.
    pub i: f64,
    /// Simulated-time horizon, in seconds.
    pub max_time: f64,
    /// RNG seed; recommended for reproducibility.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            n: 50,
            z0: 25.0,
            z1: 20.0,
            ttx: 5.0,
            i: 600.0,
            max_time: 100_000.0,
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Validate the configuration, per spec §7's single fatal error class
    /// (`ConfigurationError`). Everything else in this simulator is a
    /// silent, diagnostic drop at the point it occurs.
    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(SimError::Configuration("n must be positive".into()));
        }
        if !(0.0..=100.0).contains(&self.z0) {
            return Err(SimError::Configuration(
                "z0 must be a percentage in [0, 100]".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.z1) {
            return Err(SimError::Configuration(
                "z1 must be a percentage in [0, 100]".into(),
            ));
        }
        if self.ttx <= 0.0 {
            return Err(SimError::Configuration("Ttx must be positive".into()));
        }
        if self.i <= 0.0 {
            return Err(SimError::Configuration(
                "I (target block interval) must be positive".into(),
            ));
        }
        if self.max_time < 0.0 {
            return Err(SimError::Configuration("max_time must be non-negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_peers() {
        let cfg = SimConfig {
            n: 0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_percentages() {
        let cfg = SimConfig {
            z0: 150.0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_times() {
        let cfg = SimConfig {
            ttx: 0.0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SimConfig {
            i: -1.0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
