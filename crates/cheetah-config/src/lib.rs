//! Configuration management for Cheetah
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence, applied by the caller)
//! 2. Environment variables (`CHEETAH_*` prefix, `__` between keys)
//! 3. cheetah.local.toml (gitignored, local overrides)
//! 4. cheetah.toml (git-tracked, project config)
//! 5. ~/.config/cheetah/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use std::path::Path;

use anyhow::Result;
use cheetah_bft::{
    ClusterConfig, FallbackAdvance, MessageKind, PrimarySelection, ReplicaId, ReplicaOptions,
};
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{ConfigSource, Paths};

/// Main Cheetah configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheetahConfig {
    pub cluster: ClusterSection,
    pub simulation: SimulationSection,
}

/// Cluster membership and per-replica behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Number of replicas (`N`).
    pub nodes: usize,
    /// Byzantine faults tolerated (`f`).
    pub faults: usize,
    pub primary: PrimaryMode,
    /// Leader for every view when `primary = "fixed"`.
    pub primary_replica: u8,
    pub log_transitions: bool,
    pub fallback_advance: FallbackAdvance,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            nodes: 4,
            faults: 1,
            primary: PrimaryMode::Fixed,
            primary_replica: 0,
            log_transitions: false,
            fallback_advance: FallbackAdvance::Automatic,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryMode {
    Fixed,
    RoundRobin,
}

/// Knobs for the deterministic simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub seed: u64,
    /// Upper bound on delivered messages before the run is abandoned.
    pub max_steps: u64,
    /// Value carried by the client request.
    pub request_value: u64,
    /// Deliver in uniformly random order instead of FIFO.
    pub reorder: bool,
    pub drop_probability: f64,
    /// Kinds subject to `drop_probability`; empty means every kind.
    pub drop_kinds: Vec<MessageKind>,
    /// Fire every replica's timeout after this many deliveries.
    pub timeout_after_steps: Option<u64>,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            seed: 0,
            max_steps: 10_000,
            request_value: 42,
            reorder: false,
            drop_probability: 0.0,
            drop_kinds: Vec::new(),
            timeout_after_steps: None,
        }
    }
}

impl CheetahConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Checks everything the loader cannot express in types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cluster_config()?;

        let p = self.simulation.drop_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::DropProbability(p));
        }
        if self.simulation.max_steps == 0 {
            return Err(ConfigError::ZeroMaxSteps);
        }
        Ok(())
    }

    /// Builds the validated core cluster configuration.
    pub fn cluster_config(&self) -> Result<ClusterConfig, ConfigError> {
        let config = ClusterConfig::new(self.cluster.nodes, self.cluster.faults)?;
        let primary = match self.cluster.primary {
            PrimaryMode::Fixed => {
                PrimarySelection::Fixed(ReplicaId::new(self.cluster.primary_replica))
            }
            PrimaryMode::RoundRobin => PrimarySelection::RoundRobin,
        };
        Ok(config.with_primary(primary)?)
    }

    pub fn replica_options(&self) -> ReplicaOptions {
        ReplicaOptions::default()
            .with_logging(self.cluster.log_transitions)
            .with_fallback_advance(self.cluster.fallback_advance)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bft::{ClusterConfigError, ViewNumber};
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = CheetahConfig::default();
        assert_eq!(config.cluster.nodes, 4);
        assert_eq!(config.cluster.faults, 1);
        assert_eq!(config.cluster.primary, PrimaryMode::Fixed);
        assert_eq!(config.simulation.request_value, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cluster_config_conversion() {
        let mut config = CheetahConfig::default();
        config.cluster.nodes = 7;
        config.cluster.faults = 2;
        config.cluster.primary = PrimaryMode::RoundRobin;

        let cluster = config.cluster_config().expect("valid cluster");
        assert_eq!(cluster.quorum_size(), 5);
        assert_eq!(cluster.fast_path_size(), 7);
        assert_eq!(cluster.primary_for_view(ViewNumber::new(3)), ReplicaId::new(3));
    }

    #[test]
    fn test_rejects_undersized_cluster() {
        let mut config = CheetahConfig::default();
        config.cluster.nodes = 3;

        assert_eq!(
            config.validate(),
            Err(ConfigError::Cluster(ClusterConfigError::TooFewReplicas {
                cluster_size: 3,
                max_faults: 1,
                required: 4,
            }))
        );
    }

    #[test]
    fn test_rejects_overflowing_fault_count() {
        let mut config = CheetahConfig::default();
        config.cluster.faults = usize::MAX;

        assert_eq!(
            config.validate(),
            Err(ConfigError::Cluster(ClusterConfigError::TooManyFaults(
                usize::MAX
            )))
        );
    }

    #[test]
    fn test_rejects_unknown_fixed_primary() {
        let mut config = CheetahConfig::default();
        config.cluster.primary_replica = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Cluster(ClusterConfigError::UnknownPrimary { .. }))
        ));
    }

    #[test_case(-0.1; "negative")]
    #[test_case(1.5; "above one")]
    #[test_case(f64::NAN; "nan")]
    fn test_rejects_bad_drop_probability(p: f64) {
        let mut config = CheetahConfig::default();
        config.simulation.drop_probability = p;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DropProbability(_))
        ));
    }

    #[test]
    fn test_replica_options() {
        let mut config = CheetahConfig::default();
        config.cluster.log_transitions = true;
        config.cluster.fallback_advance = FallbackAdvance::External;

        let options = config.replica_options();
        assert!(options.log_transitions);
        assert_eq!(options.fallback_advance, FallbackAdvance::External);
    }

    #[test]
    fn test_toml_rendering_parses_back() {
        let mut config = CheetahConfig::default();
        config.simulation.drop_kinds = vec![MessageKind::Commit, MessageKind::CpPreVote];
        config.simulation.timeout_after_steps = Some(12);

        let rendered = config.to_toml().expect("serializable");
        assert!(rendered.contains("[cluster]"));
        assert!(rendered.contains("cp-pre-vote"));

        let parsed: CheetahConfig = toml::from_str(&rendered).expect("valid TOML");
        assert_eq!(parsed, config);
    }
}
