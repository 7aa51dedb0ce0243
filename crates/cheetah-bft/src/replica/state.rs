//! Replica state structure.
//!
//! This module defines [`Replica`], the complete state of one protocol
//! participant, along with event dispatch and the broadcast primitive. The
//! state is cloneable for simulation testing and performs no I/O.

use std::fmt::Display;

use crate::config::{ClusterConfig, ReplicaOptions};
use crate::message::{Message, MessagePayload};
use crate::quorum::{RoundVotes, VoteTracker};
use crate::types::{BinaryVote, Phase, ReplicaId, RoundNumber, Value, ViewNumber};

use super::{Decision, ReplicaEvent, ReplicaOutput};

/// A recorded fallback pre-vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreVote {
    pub vote: BinaryVote,
    pub value: Option<Value>,
}

// ============================================================================
// Replica State
// ============================================================================

/// The state of a single replica for one consensus instance.
///
/// # State Categories
///
/// 1. **Identity**: `replica_id`, `config`, `options`
/// 2. **View State**: `view`, `phase`
/// 3. **Optimistic Path**: `committed`, `decided_value`
/// 4. **Fallback**: `cp_round`, `cp_pre_votes`, `cp_main_votes`
#[derive(Debug, Clone)]
pub struct Replica {
    // ========================================================================
    // Identity
    // ========================================================================
    pub(crate) replica_id: ReplicaId,
    pub(crate) config: ClusterConfig,
    pub(crate) options: ReplicaOptions,

    // ========================================================================
    // View State
    // ========================================================================
    /// Current view. Only messages stamped with this view are processed.
    pub(crate) view: ViewNumber,

    pub(crate) phase: Phase,

    // ========================================================================
    // Optimistic Path
    // ========================================================================
    /// Value of the latest `Commit` from each sender in the current view.
    pub(crate) committed: VoteTracker<Option<Value>>,

    /// Set whenever the replica enters `Decided`.
    pub(crate) decided_value: Option<Value>,

    // ========================================================================
    // Fallback Agreement
    // ========================================================================
    pub(crate) cp_round: RoundNumber,
    pub(crate) cp_pre_votes: RoundVotes<PreVote>,
    pub(crate) cp_main_votes: RoundVotes<BinaryVote>,

    /// A round failed and the next one has not been started yet.
    pub(crate) awaiting_round_start: bool,
}

impl Replica {
    /// Creates a replica in the `Idle` phase of view 0.
    pub fn new(replica_id: ReplicaId, config: ClusterConfig, options: ReplicaOptions) -> Self {
        debug_assert!(
            config.contains(replica_id),
            "replica must be in cluster config"
        );
        debug_assert!(
            config.cluster_size() >= config.fast_path_size(),
            "cluster must satisfy N >= 3f+1"
        );

        Self {
            replica_id,
            config,
            options,
            view: ViewNumber::ZERO,
            phase: Phase::Idle,
            committed: VoteTracker::new(),
            decided_value: None,
            cp_round: RoundNumber::ZERO,
            cp_pre_votes: RoundVotes::new(),
            cp_main_votes: RoundVotes::new(),
            awaiting_round_start: false,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns this replica's ID.
    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    /// Returns the cluster configuration.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Returns the per-replica behavior switches.
    pub fn options(&self) -> ReplicaOptions {
        self.options
    }

    /// Returns the current view number.
    pub fn view(&self) -> ViewNumber {
        self.view
    }

    /// Returns the current protocol phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the current fallback round.
    pub fn cp_round(&self) -> RoundNumber {
        self.cp_round
    }

    /// Returns the primary of the current view.
    pub fn primary(&self) -> ReplicaId {
        self.config.primary_for_view(self.view)
    }

    /// Returns true if this replica leads the current view.
    pub fn is_primary(&self) -> bool {
        self.primary() == self.replica_id
    }

    /// Returns true once the replica is in `Decided`.
    pub fn is_decided(&self) -> bool {
        self.phase == Phase::Decided
    }

    /// The value recorded on entering `Decided`. `None` both before a
    /// decision and after deciding on no value.
    pub fn decided_value(&self) -> Option<Value> {
        self.decided_value
    }

    /// Number of distinct senders whose `Commit` was recorded in this view.
    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    /// Commits recorded in the current view, by sender.
    pub fn committed(&self) -> &VoteTracker<Option<Value>> {
        &self.committed
    }

    /// Pre-votes recorded for `round`, if that round was started.
    pub fn pre_votes(&self, round: RoundNumber) -> Option<&VoteTracker<PreVote>> {
        self.cp_pre_votes.get(round)
    }

    /// Main votes recorded for `round`, if that round was started.
    pub fn main_votes(&self, round: RoundNumber) -> Option<&VoteTracker<BinaryVote>> {
        self.cp_main_votes.get(round)
    }

    /// Number of fallback rounds with vote history in the current view.
    pub fn fallback_rounds(&self) -> usize {
        self.cp_pre_votes.len()
    }

    /// Returns true if a failed round is waiting for
    /// [`ReplicaEvent::AdvanceRound`].
    pub fn is_awaiting_round_start(&self) -> bool {
        self.awaiting_round_start
    }

    // ========================================================================
    // Event Processing (Main Entry Point)
    // ========================================================================

    /// Processes an event and returns the new state and output.
    ///
    /// This is the main entry point for the state machine. All state
    /// transitions go through this method. The caller is responsible for
    /// handing `output.messages` to the transport.
    pub fn process(self, event: ReplicaEvent) -> (Self, ReplicaOutput) {
        match event {
            ReplicaEvent::Message(msg) => self.on_message(msg),
            ReplicaEvent::Timeout => self.enter_fallback(),
            ReplicaEvent::AdvanceRound => self.on_advance_round(),
        }
    }

    /// Handles one inbound message.
    pub fn handle(self, message: Message) -> (Self, ReplicaOutput) {
        self.process(ReplicaEvent::Message(message))
    }

    /// Signals that the optimistic path timed out.
    ///
    /// `Decided` is terminal: the timeout is a no-op there. Anywhere else it
    /// (re)starts the fallback at the current round.
    pub fn on_timeout(self) -> (Self, ReplicaOutput) {
        self.process(ReplicaEvent::Timeout)
    }

    /// Starts the pending fallback round.
    pub fn advance_round(self) -> (Self, ReplicaOutput) {
        self.process(ReplicaEvent::AdvanceRound)
    }

    /// Validates the view and dispatches by payload.
    pub(crate) fn on_message(self, msg: Message) -> (Self, ReplicaOutput) {
        if msg.view != self.view {
            tracing::trace!(
                replica = %self.replica_id,
                view = %self.view,
                msg_view = %msg.view,
                kind = %msg.kind(),
                "dropping message for foreign view"
            );
            return (self, ReplicaOutput::empty());
        }

        let from = msg.from;
        match msg.payload {
            // Checkpoint: accepted in every phase.
            MessagePayload::Reply { value } => self.on_reply(from, value),

            MessagePayload::Request { value } => self.on_request(value),
            MessagePayload::PrePrepare { value } => self.on_pre_prepare(from, value),
            MessagePayload::Commit { value } => self.on_commit(from, value),

            MessagePayload::CpPreVote { round, vote, value } => {
                self.on_cp_pre_vote(from, round, PreVote { vote, value })
            }
            MessagePayload::CpMainVote { round, vote } => self.on_cp_main_vote(from, round, vote),
            MessagePayload::CpDecide { round, vote } => self.on_cp_decide(from, round, vote),
        }
    }

    // ========================================================================
    // Reply (Checkpoint)
    // ========================================================================

    /// Handles a `Reply`.
    ///
    /// A reply is an authoritative checkpoint: it moves the replica to
    /// `Decided` from any phase and overwrites an earlier decided value.
    pub(crate) fn on_reply(mut self, from: ReplicaId, value: Option<Value>) -> (Self, ReplicaOutput) {
        if self.phase != Phase::Decided {
            self.log_transition("moved to DECIDED phase on REPLY");
        }
        tracing::debug!(
            replica = %self.replica_id,
            from = %from,
            view = %self.view,
            value = ?value,
            "accepted REPLY checkpoint"
        );

        self.phase = Phase::Decided;
        self.decided_value = value;
        self.awaiting_round_start = false;

        let decision = Decision {
            view: self.view,
            value,
        };
        (self, ReplicaOutput::empty().with_decision(decision))
    }

    // ========================================================================
    // Broadcast
    // ========================================================================

    /// Broadcasts `payload` stamped with the current view.
    ///
    /// The message is appended to the output for the transport and then
    /// delivered to this replica before anything else happens.
    pub(crate) fn broadcast(self, payload: MessagePayload) -> (Self, ReplicaOutput) {
        let msg = Message::new(self.replica_id, self.view, payload);
        if self.options.log_transitions {
            tracing::debug!(
                replica = %self.replica_id,
                view = %self.view,
                "sent message {msg}"
            );
        }

        let mut output = ReplicaOutput::with_message(msg.clone());
        let (new_self, delivered) = self.on_message(msg);
        output.merge(delivered);
        (new_self, output)
    }

    /// Emits the per-transition diagnostic line when enabled.
    pub(crate) fn log_transition(&self, description: impl Display) {
        if self.options.log_transitions {
            tracing::info!(
                replica = %self.replica_id,
                view = %self.view,
                phase = %self.phase,
                "{description}"
            );
        }
    }

    /// Logs a message dropped by a phase or round guard.
    pub(crate) fn log_drop(&self, from: ReplicaId, kind: &'static str, reason: &'static str) {
        tracing::trace!(
            replica = %self.replica_id,
            view = %self.view,
            phase = %self.phase,
            round = %self.cp_round,
            from = %from,
            kind,
            "dropping message: {reason}"
        );
    }
}
