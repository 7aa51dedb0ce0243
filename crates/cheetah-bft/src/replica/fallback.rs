//! Fallback binary agreement.
//!
//! Entered on timeout. Each round is one pre-vote exchange followed by one
//! main-vote exchange, both gated on `2f+1` distinct senders:
//!
//! 1. **Pre-vote**: round 0 votes `Yes` (abandon the view) unless the
//!    replica already holds `2f+1` commits. Later rounds copy the previous
//!    round's main vote, with `Abstain` resolved to `No`.
//! 2. **Early decide**: `2f+1` `No` pre-votes end the instance with a
//!    `Reply`.
//! 3. **Main vote**: `Yes` if `2f+1` pre-votes said `Yes`, else `Abstain`.
//! 4. **Outcome**: `2f+1` `Yes` main votes move every replica into the next
//!    view's commit phase. Anything else starts the next round.

use crate::config::FallbackAdvance;
use crate::message::MessagePayload;
use crate::types::{BinaryVote, Phase, ReplicaId, RoundNumber};

use super::state::PreVote;
use super::{Replica, ReplicaOutput};

impl Replica {
    // ========================================================================
    // Entering the Fallback
    // ========================================================================

    /// Handles the external timeout signal.
    ///
    /// A decided replica has nothing left to agree on and ignores it. In any
    /// other phase the current round is (re)started.
    pub(crate) fn enter_fallback(self) -> (Self, ReplicaOutput) {
        if self.phase == Phase::Decided {
            tracing::trace!(
                replica = %self.replica_id,
                view = %self.view,
                "ignoring timeout after decision"
            );
            return (self, ReplicaOutput::empty());
        }

        tracing::debug!(
            replica = %self.replica_id,
            view = %self.view,
            phase = %self.phase,
            round = %self.cp_round,
            "optimistic path timed out"
        );
        self.enter_pre_vote()
    }

    /// Starts the round that a failed main vote left pending.
    pub(crate) fn on_advance_round(self) -> (Self, ReplicaOutput) {
        if self.phase != Phase::CpPreVote || !self.awaiting_round_start {
            tracing::trace!(
                replica = %self.replica_id,
                phase = %self.phase,
                round = %self.cp_round,
                "no fallback round pending"
            );
            return (self, ReplicaOutput::empty());
        }

        self.enter_pre_vote()
    }

    /// Enters `CpPreVote` for `cp_round` and broadcasts this replica's
    /// proposal.
    pub(crate) fn enter_pre_vote(mut self) -> (Self, ReplicaOutput) {
        self.phase = Phase::CpPreVote;
        self.awaiting_round_start = false;
        self.cp_pre_votes.open_round(self.cp_round);
        self.cp_main_votes.open_round(self.cp_round);

        let vote = self.round_proposal();

        self.log_transition(format_args!(
            "requested view change to view {}",
            self.view.next()
        ));
        tracing::debug!(
            replica = %self.replica_id,
            view = %self.view,
            round = %self.cp_round,
            vote = %vote,
            "entering fallback pre-vote"
        );

        let round = self.cp_round;
        self.broadcast(MessagePayload::CpPreVote {
            round,
            vote,
            value: None,
        })
    }

    /// The biased proposal for the current round.
    fn round_proposal(&self) -> BinaryVote {
        match self.cp_round.previous() {
            None => {
                if self.committed.len() < self.config.quorum_size() {
                    BinaryVote::Yes
                } else {
                    BinaryVote::No
                }
            }
            Some(previous) => {
                let carried = self
                    .cp_main_votes
                    .get(previous)
                    .and_then(|votes| votes.first())
                    .copied();
                match carried {
                    Some(BinaryVote::Yes) => BinaryVote::Yes,
                    // Abstain (or no vote at all) resolves to the fixed bias.
                    Some(BinaryVote::No | BinaryVote::Abstain) | None => BinaryVote::No,
                }
            }
        }
    }

    // ========================================================================
    // Pre-Vote Handling
    // ========================================================================

    /// Handles a `CpPreVote`.
    pub(crate) fn on_cp_pre_vote(
        mut self,
        from: ReplicaId,
        round: RoundNumber,
        pre_vote: PreVote,
    ) -> (Self, ReplicaOutput) {
        if self.phase != Phase::CpPreVote {
            self.log_drop(from, "CP:PRE-VOTE", "not in CP:PRE-VOTE phase");
            return (self, ReplicaOutput::empty());
        }
        if round != self.cp_round {
            self.log_drop(from, "CP:PRE-VOTE", "round mismatch");
            return (self, ReplicaOutput::empty());
        }

        let quorum = self.config.quorum_size();
        let Some(votes) = self.cp_pre_votes.get_mut(round) else {
            // `enter_pre_vote` opens the round before any vote can match it.
            self.log_drop(from, "CP:PRE-VOTE", "round not open");
            return (self, ReplicaOutput::empty());
        };
        votes.record(from, pre_vote);

        // The quorum is evaluated once this replica has voted itself.
        if self.awaiting_round_start || !votes.reaches(quorum) {
            return (self, ReplicaOutput::empty());
        }

        let no_votes = votes.count(|v| v.vote == BinaryVote::No);
        let yes_votes = votes.count(|v| v.vote == BinaryVote::Yes);

        if no_votes >= quorum {
            tracing::info!(
                replica = %self.replica_id,
                view = %self.view,
                round = %round,
                no_votes,
                "fallback decided early on NO pre-vote quorum"
            );
            return self.broadcast(MessagePayload::Reply {
                value: pre_vote.value,
            });
        }

        let main_vote = if yes_votes >= quorum {
            BinaryVote::Yes
        } else {
            BinaryVote::Abstain
        };

        self.phase = Phase::CpMainVote;
        self.log_transition(format_args!("moved to CP:MAIN-VOTE phase in round {round}"));
        tracing::debug!(
            replica = %self.replica_id,
            view = %self.view,
            round = %round,
            yes_votes,
            no_votes,
            main_vote = %main_vote,
            "pre-vote quorum reached"
        );

        self.broadcast(MessagePayload::CpMainVote {
            round,
            vote: main_vote,
        })
    }

    // ========================================================================
    // Main-Vote Handling
    // ========================================================================

    /// Handles a `CpMainVote`.
    pub(crate) fn on_cp_main_vote(
        mut self,
        from: ReplicaId,
        round: RoundNumber,
        vote: BinaryVote,
    ) -> (Self, ReplicaOutput) {
        if self.phase != Phase::CpMainVote {
            self.log_drop(from, "CP:MAIN-VOTE", "not in CP:MAIN-VOTE phase");
            return (self, ReplicaOutput::empty());
        }
        if round != self.cp_round {
            self.log_drop(from, "CP:MAIN-VOTE", "round mismatch");
            return (self, ReplicaOutput::empty());
        }

        let quorum = self.config.quorum_size();
        let Some(votes) = self.cp_main_votes.get_mut(round) else {
            self.log_drop(from, "CP:MAIN-VOTE", "round not open");
            return (self, ReplicaOutput::empty());
        };
        votes.record(from, vote);

        if !votes.reaches(quorum) {
            return (self, ReplicaOutput::empty());
        }

        let yes_votes = votes.count(|v| *v == BinaryVote::Yes);
        if yes_votes >= quorum {
            self.complete_view_change()
        } else {
            self.fail_round()
        }
    }

    /// Moves into the commit phase of the next view.
    fn complete_view_change(mut self) -> (Self, ReplicaOutput) {
        let old_view = self.view;

        self.phase = Phase::Commit;
        self.cp_round = RoundNumber::ZERO;
        self.cp_pre_votes.clear();
        self.cp_main_votes.clear();
        self.committed.clear();
        self.awaiting_round_start = false;
        self.view = self.view.next();

        self.log_transition("moved to COMMIT phase after view change");
        tracing::info!(
            replica = %self.replica_id,
            old_view = %old_view,
            new_view = %self.view,
            "fallback converged, view advanced"
        );

        self.broadcast(MessagePayload::Commit { value: None })
    }

    /// Ends the current round without a `Yes` main-vote quorum.
    fn fail_round(mut self) -> (Self, ReplicaOutput) {
        let failed = self.cp_round;
        self.phase = Phase::CpPreVote;
        self.cp_round = failed.next();

        tracing::debug!(
            replica = %self.replica_id,
            view = %self.view,
            failed_round = %failed,
            next_round = %self.cp_round,
            "fallback round ended without YES quorum"
        );

        match self.options.fallback_advance {
            FallbackAdvance::Automatic => self.enter_pre_vote(),
            FallbackAdvance::External => {
                // Peers that already started the round can be counted.
                self.cp_pre_votes.open_round(self.cp_round);
                self.cp_main_votes.open_round(self.cp_round);
                self.awaiting_round_start = true;
                self.log_transition(format_args!(
                    "waiting to start fallback round {}",
                    self.cp_round
                ));
                (
                    self,
                    ReplicaOutput {
                        round_pending: true,
                        ..ReplicaOutput::default()
                    },
                )
            }
        }
    }

    // ========================================================================
    // Reserved
    // ========================================================================

    /// `CpDecide` has no transition; it is accepted and dropped.
    pub(crate) fn on_cp_decide(
        self,
        from: ReplicaId,
        round: RoundNumber,
        vote: BinaryVote,
    ) -> (Self, ReplicaOutput) {
        tracing::trace!(
            replica = %self.replica_id,
            from = %from,
            round = %round,
            vote = %vote,
            "ignoring CP:DECIDE"
        );
        (self, ReplicaOutput::empty())
    }
}
