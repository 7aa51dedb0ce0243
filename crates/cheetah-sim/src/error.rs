//! Simulation errors.

use cheetah_bft::{ClusterConfigError, MessageError, ReplicaId, Value, ViewNumber};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Two replicas decided different values in the same view.
    #[error(
        "agreement violated in view {view}: replica {first} decided {}, replica {second} decided {}",
        show(*first_value),
        show(*second_value)
    )]
    AgreementViolation {
        view: ViewNumber,
        first: ReplicaId,
        first_value: Option<Value>,
        second: ReplicaId,
        second_value: Option<Value>,
    },

    #[error("simulation did not quiesce within {max_steps} steps")]
    StepLimitExceeded { max_steps: u64 },

    #[error("replica {0} is not part of the simulated cluster")]
    UnknownReplica(ReplicaId),

    #[error(transparent)]
    Cluster(#[from] ClusterConfigError),

    #[error(transparent)]
    Codec(#[from] MessageError),
}

fn show(value: Option<Value>) -> String {
    value.map_or_else(|| "null".to_owned(), |v| v.to_string())
}
