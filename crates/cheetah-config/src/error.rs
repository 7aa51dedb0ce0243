//! Configuration error types

use cheetah_bft::ClusterConfigError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid cluster: {0}")]
    Cluster(#[from] ClusterConfigError),

    #[error("Drop probability {0} is outside [0, 1]")]
    DropProbability(f64),

    #[error("Simulation max_steps must be at least 1")]
    ZeroMaxSteps,

    #[error("Failed to render configuration: {0}")]
    Serialize(String),

    #[error("XDG directory error: {0}")]
    XdgError(String),
}
