//! Cluster and replica configuration.
//!
//! [`ClusterConfig`] is the only place the `N ≥ 3f+1` requirement is
//! checked. A [`crate::Replica`] can only be built from a config that
//! passed validation, so the state machine itself never re-checks it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ReplicaId, ViewNumber};

/// Largest cluster addressable with `u8` replica ids.
pub const MAX_CLUSTER_SIZE: usize = 256;

/// Errors raised when building a [`ClusterConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterConfigError {
    #[error("cluster of {cluster_size} replicas cannot tolerate {max_faults} faults (need at least {required})")]
    TooFewReplicas {
        cluster_size: usize,
        max_faults: usize,
        required: usize,
    },

    #[error("cluster size {0} exceeds the maximum of {max}", max = MAX_CLUSTER_SIZE)]
    TooManyReplicas(usize),

    #[error("{0} faults cannot be tolerated by any cluster of at most {max} replicas", max = MAX_CLUSTER_SIZE)]
    TooManyFaults(usize),

    #[error("fixed primary {primary} is not a member of a {cluster_size}-replica cluster")]
    UnknownPrimary {
        primary: ReplicaId,
        cluster_size: usize,
    },
}

/// How the primary of a view is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "mode", content = "replica")]
pub enum PrimarySelection {
    /// The same replica leads every view.
    Fixed(ReplicaId),
    /// The primary of view `v` is replica `v mod N`.
    RoundRobin,
}

impl Default for PrimarySelection {
    fn default() -> Self {
        PrimarySelection::Fixed(ReplicaId::new(0))
    }
}

/// Static cluster membership: `N` replicas with ids `0..N`, tolerating `f`
/// Byzantine faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    cluster_size: usize,
    max_faults: usize,
    primary: PrimarySelection,
}

impl ClusterConfig {
    /// Creates a configuration for `cluster_size` replicas tolerating
    /// `max_faults` Byzantine faults, with replica 0 as the fixed primary.
    pub fn new(cluster_size: usize, max_faults: usize) -> Result<Self, ClusterConfigError> {
        let required = required_replicas(max_faults)?;
        if cluster_size < required {
            return Err(ClusterConfigError::TooFewReplicas {
                cluster_size,
                max_faults,
                required,
            });
        }
        if cluster_size > MAX_CLUSTER_SIZE {
            return Err(ClusterConfigError::TooManyReplicas(cluster_size));
        }

        Ok(Self {
            cluster_size,
            max_faults,
            primary: PrimarySelection::default(),
        })
    }

    /// Creates the smallest cluster tolerating `max_faults` faults (`N = 3f+1`).
    pub fn minimal(max_faults: usize) -> Result<Self, ClusterConfigError> {
        Self::new(required_replicas(max_faults)?, max_faults)
    }

    /// Replaces the primary selection policy.
    pub fn with_primary(
        mut self,
        primary: PrimarySelection,
    ) -> Result<Self, ClusterConfigError> {
        if let PrimarySelection::Fixed(id) = primary {
            if !self.contains(id) {
                return Err(ClusterConfigError::UnknownPrimary {
                    primary: id,
                    cluster_size: self.cluster_size,
                });
            }
        }
        self.primary = primary;
        Ok(self)
    }

    /// Total number of replicas (`N`).
    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    /// Maximum number of Byzantine replicas tolerated (`f`).
    pub fn max_faults(&self) -> usize {
        self.max_faults
    }

    pub fn primary_selection(&self) -> PrimarySelection {
        self.primary
    }

    /// The `2f+1` threshold used by the fallback agreement.
    pub fn quorum_size(&self) -> usize {
        2 * self.max_faults + 1
    }

    /// The `3f+1` threshold used by the optimistic commit path.
    pub fn fast_path_size(&self) -> usize {
        3 * self.max_faults + 1
    }

    /// Returns true if `id` names a replica of this cluster.
    pub fn contains(&self, id: ReplicaId) -> bool {
        id.as_usize() < self.cluster_size
    }

    /// Iterates over every replica id in ascending order.
    pub fn replicas(&self) -> impl Iterator<Item = ReplicaId> + '_ {
        (0..self.cluster_size).map(|i| ReplicaId::new(i as u8))
    }

    /// Returns the primary of `view`.
    pub fn primary_for_view(&self, view: ViewNumber) -> ReplicaId {
        match self.primary {
            PrimarySelection::Fixed(id) => id,
            PrimarySelection::RoundRobin => {
                ReplicaId::new((view.as_u64() % self.cluster_size as u64) as u8)
            }
        }
    }
}

/// `3f+1`, or an error when it does not fit in `usize`.
fn required_replicas(max_faults: usize) -> Result<usize, ClusterConfigError> {
    max_faults
        .checked_mul(3)
        .and_then(|n| n.checked_add(1))
        .ok_or(ClusterConfigError::TooManyFaults(max_faults))
}

// ============================================================================
// Replica Options
// ============================================================================

/// What happens after a fallback round ends without a main-vote quorum
/// for `Yes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackAdvance {
    /// The replica proposes for the next round immediately.
    #[default]
    Automatic,
    /// The replica waits in `CpPreVote` until the caller sends
    /// [`crate::ReplicaEvent::AdvanceRound`].
    External,
}

/// Per-replica behavioral knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplicaOptions {
    /// Emit an `info` line for every phase transition.
    pub log_transitions: bool,
    pub fallback_advance: FallbackAdvance,
}

impl ReplicaOptions {
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_transitions = enabled;
        self
    }

    pub fn with_fallback_advance(mut self, advance: FallbackAdvance) -> Self {
        self.fallback_advance = advance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 0, 1, 1; "single replica")]
    #[test_case(4, 1, 3, 4; "four replicas")]
    #[test_case(7, 2, 5, 7; "seven replicas")]
    #[test_case(10, 3, 7, 10; "ten replicas")]
    fn thresholds(n: usize, f: usize, quorum: usize, fast_path: usize) {
        let config = ClusterConfig::new(n, f).expect("valid config");
        assert_eq!(config.quorum_size(), quorum);
        assert_eq!(config.fast_path_size(), fast_path);
        assert_eq!(config.replicas().count(), n);
    }

    #[test]
    fn rejects_too_few_replicas() {
        let err = ClusterConfig::new(3, 1).unwrap_err();
        assert_eq!(
            err,
            ClusterConfigError::TooFewReplicas {
                cluster_size: 3,
                max_faults: 1,
                required: 4,
            }
        );
    }

    #[test]
    fn rejects_oversized_cluster() {
        assert_eq!(
            ClusterConfig::new(300, 1).unwrap_err(),
            ClusterConfigError::TooManyReplicas(300)
        );
    }

    #[test_case(usize::MAX; "max")]
    #[test_case(usize::MAX / 2; "multiply overflows")]
    fn rejects_fault_counts_that_overflow(max_faults: usize) {
        assert_eq!(
            ClusterConfig::new(4, max_faults).unwrap_err(),
            ClusterConfigError::TooManyFaults(max_faults)
        );
        assert_eq!(
            ClusterConfig::minimal(max_faults).unwrap_err(),
            ClusterConfigError::TooManyFaults(max_faults)
        );
    }

    #[test]
    fn large_fault_count_without_overflow_is_too_few_replicas() {
        assert!(matches!(
            ClusterConfig::new(4, 1_000),
            Err(ClusterConfigError::TooFewReplicas { required: 3_001, .. })
        ));
    }

    #[test]
    fn fixed_primary_ignores_view() {
        let config = ClusterConfig::minimal(1).unwrap();
        for view in 0..10 {
            assert_eq!(
                config.primary_for_view(ViewNumber::new(view)),
                ReplicaId::new(0)
            );
        }
    }

    #[test]
    fn round_robin_primary_rotates() {
        let config = ClusterConfig::minimal(1)
            .unwrap()
            .with_primary(PrimarySelection::RoundRobin)
            .unwrap();

        assert_eq!(config.primary_for_view(ViewNumber::new(0)), ReplicaId::new(0));
        assert_eq!(config.primary_for_view(ViewNumber::new(1)), ReplicaId::new(1));
        assert_eq!(config.primary_for_view(ViewNumber::new(5)), ReplicaId::new(1));
    }

    #[test]
    fn fixed_primary_must_be_member() {
        let err = ClusterConfig::minimal(1)
            .unwrap()
            .with_primary(PrimarySelection::Fixed(ReplicaId::new(9)))
            .unwrap_err();
        assert!(matches!(err, ClusterConfigError::UnknownPrimary { .. }));
    }
}
