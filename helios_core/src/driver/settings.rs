//! Run settings and their defaults.

use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::numeric_types::Real;

/// Within-node concurrency policy for running a batch's histories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    Single,
    Threadpool,
    Tasks,
}

/// Batch/cycle layout of a criticality (k-eff) run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalitySettings {
    pub batches: u32,
    pub inactive: u32,
    pub particles: u64,
}

impl Default for CriticalitySettings {
    fn default() -> Self {
        Self {
            batches: 100,
            inactive: 10,
            particles: 10_000,
        }
    }
}

/// All tunables surfaced through the `setting` input object kind, plus CLI overrides.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub seed: u64,
    pub multithread: ConcurrencyPolicy,
    pub max_rng_per_history: u64,
    pub max_source_samples: u64,
    pub energy_freegas_threshold: Real,
    pub awr_freegas_threshold: Real,
    pub criticality: CriticalitySettings,
    /// Per-run cap on lost/erroneous particles before the simulation aborts.
    pub max_lost_particles: u64,
    /// CLI `--threads`; `None` lets the thread pool builder pick a default.
    pub threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 10,
            multithread: ConcurrencyPolicy::Tasks,
            max_rng_per_history: 100_000,
            max_source_samples: 100,
            energy_freegas_threshold: 4.0,
            awr_freegas_threshold: 1.0,
            criticality: CriticalitySettings::default(),
            max_lost_particles: 10,
            threads: None,
        }
    }
}

/// A parsed `setting` object's value, keyed by name.
pub enum SettingValue {
    UInt(u64),
    Float(Real),
    Policy(ConcurrencyPolicy),
    Criticality(CriticalitySettings),
}

impl Settings {
    /// Applies one named setting, as would be produced by the (out-of-scope) input parser.
    pub fn apply(&mut self, name: &str, value: SettingValue) -> Result<(), SetupError> {
        match (name, value) {
            ("seed", SettingValue::UInt(v)) => self.seed = v,
            ("max_rng_per_history", SettingValue::UInt(v)) => self.max_rng_per_history = v,
            ("max_source_samples", SettingValue::UInt(v)) => self.max_source_samples = v,
            ("max_lost_particles", SettingValue::UInt(v)) => self.max_lost_particles = v,
            ("energy_freegas_threshold", SettingValue::Float(v)) => {
                self.energy_freegas_threshold = v
            }
            ("awr_freegas_threshold", SettingValue::Float(v)) => self.awr_freegas_threshold = v,
            ("multithread", SettingValue::Policy(v)) => self.multithread = v,
            ("criticality", SettingValue::Criticality(v)) => self.criticality = v,
            (other, _) => return Err(SetupError::MissingSetting(other.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let s = Settings::default();
        assert_eq!(s.seed, 10);
        assert_eq!(s.max_rng_per_history, 100_000);
        assert_eq!(s.max_source_samples, 100);
        assert_eq!(s.multithread, ConcurrencyPolicy::Tasks);
    }

    #[test]
    fn apply_overrides_seed() {
        let mut s = Settings::default();
        s.apply("seed", SettingValue::UInt(42)).unwrap();
        assert_eq!(s.seed, 42);
    }
}
