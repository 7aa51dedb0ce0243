//! Optimistic-path message handlers.
//!
//! This module handles the fast path: `Request`, `PrePrepare`, and `Commit`.

use crate::message::MessagePayload;
use crate::types::{Phase, ReplicaId, Value};

use super::{Replica, ReplicaOutput};

impl Replica {
    // ========================================================================
    // Request Handling
    // ========================================================================

    /// Handles a client `Request`.
    ///
    /// Every replica moves to `PrePrepare`; only the primary of the current
    /// view proposes the value.
    pub(crate) fn on_request(mut self, value: Value) -> (Self, ReplicaOutput) {
        if self.phase != Phase::Idle {
            tracing::trace!(
                replica = %self.replica_id,
                phase = %self.phase,
                value = %value,
                "ignoring request outside IDLE"
            );
            return (self, ReplicaOutput::empty());
        }

        self.phase = Phase::PrePrepare;
        self.log_transition("moved to PRE-PREPARE phase");

        if !self.is_primary() {
            return (self, ReplicaOutput::empty());
        }

        tracing::debug!(
            replica = %self.replica_id,
            view = %self.view,
            value = %value,
            "proposing value as primary"
        );
        self.broadcast(MessagePayload::PrePrepare { value })
    }

    // ========================================================================
    // PrePrepare Handling
    // ========================================================================

    /// Handles a `PrePrepare`.
    ///
    /// The sender is not checked against the primary: any proposal that
    /// arrives in the `PrePrepare` phase is committed.
    pub(crate) fn on_pre_prepare(mut self, from: ReplicaId, value: Value) -> (Self, ReplicaOutput) {
        if self.phase != Phase::PrePrepare {
            self.log_drop(from, "PRE-PREPARE", "not in PRE-PREPARE phase");
            return (self, ReplicaOutput::empty());
        }

        self.phase = Phase::Commit;
        self.log_transition("moved to COMMIT phase");

        self.broadcast(MessagePayload::Commit { value: Some(value) })
    }

    // ========================================================================
    // Commit Handling
    // ========================================================================

    /// Handles a `Commit`.
    ///
    /// One entry is kept per sender. Once every one of the `3f+1` replicas
    /// has committed, the replica decides the value carried by the commit
    /// that completed the set and broadcasts a `Reply`.
    pub(crate) fn on_commit(mut self, from: ReplicaId, value: Option<Value>) -> (Self, ReplicaOutput) {
        if self.phase != Phase::Commit {
            self.log_drop(from, "COMMIT", "not in COMMIT phase");
            return (self, ReplicaOutput::empty());
        }

        self.committed.record(from, value);

        tracing::trace!(
            replica = %self.replica_id,
            from = %from,
            view = %self.view,
            commits = self.committed.len(),
            needed = self.config.fast_path_size(),
            "recorded COMMIT"
        );

        if !self.committed.reaches(self.config.fast_path_size()) {
            return (self, ReplicaOutput::empty());
        }

        self.phase = Phase::Decided;
        self.decided_value = value;
        self.log_transition(format_args!(
            "DECIDED on value {}",
            display_value(value)
        ));

        tracing::info!(
            replica = %self.replica_id,
            view = %self.view,
            value = ?value,
            "decided on optimistic path"
        );

        // Self-delivery of the reply reports the decision.
        self.broadcast(MessagePayload::Reply { value })
    }
}

/// Renders an optional value the way messages print it.
fn display_value(value: Option<Value>) -> String {
    value.map_or_else(|| "null".to_owned(), |v| v.to_string())
}
