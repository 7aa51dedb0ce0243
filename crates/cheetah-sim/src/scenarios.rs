//! Canned scenarios.
//!
//! Each scenario builds a [`Simulation`] with a fixed shape, submits the
//! client request and runs it to quiescence.

use cheetah_bft::{ClusterConfig, MessageKind, Value};

use crate::error::SimError;
use crate::network::NetworkConfig;
use crate::simulation::{SimConfig, Simulation};

/// The scenarios the simulator knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioType {
    /// Reliable FIFO network, four replicas, one request.
    HappyPath,
    /// Every `Commit` is lost, so the fallback has to move the view.
    FallbackConvergence,
}

impl ScenarioType {
    pub const ALL: [ScenarioType; 2] = [ScenarioType::HappyPath, ScenarioType::FallbackConvergence];

    pub fn name(self) -> &'static str {
        match self {
            ScenarioType::HappyPath => "happy-path",
            ScenarioType::FallbackConvergence => "fallback-convergence",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ScenarioType::HappyPath => "all replicas decide on the optimistic path",
            ScenarioType::FallbackConvergence => {
                "commits are lost; the fallback moves every replica to view 1"
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Builds the scenario's configuration.
    pub fn config(self, seed: u64) -> Result<SimConfig, SimError> {
        let base = SimConfig::new(ClusterConfig::minimal(1)?).with_seed(seed);

        Ok(match self {
            ScenarioType::HappyPath => base,
            ScenarioType::FallbackConvergence => base
                .with_network(NetworkConfig::default().with_drops(1.0, [MessageKind::Commit])),
        })
    }

    /// Runs the scenario with request value 42.
    pub fn run(self, seed: u64) -> Result<Simulation, SimError> {
        let config = self.config(seed)?;
        let max_steps = config.max_steps;

        tracing::info!(scenario = self.name(), seed, "running scenario");
        let mut sim = Simulation::new(config);
        sim.submit_request(Value::new(42))?;
        sim.run_until_quiescent(max_steps)?;
        sim.check_agreement()?;
        Ok(sim)
    }
}

/// Runs [`ScenarioType::HappyPath`].
pub fn happy_path(seed: u64) -> Result<Simulation, SimError> {
    ScenarioType::HappyPath.run(seed)
}

/// Runs [`ScenarioType::FallbackConvergence`].
pub fn fallback_convergence(seed: u64) -> Result<Simulation, SimError> {
    ScenarioType::FallbackConvergence.run(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for scenario in ScenarioType::ALL {
            assert_eq!(ScenarioType::from_name(scenario.name()), Some(scenario));
        }
        assert_eq!(ScenarioType::from_name("split-brain"), None);
    }
}
