//! Replica state machine.
//!
//! This module implements the per-replica protocol as a pure, deterministic
//! state machine:
//! - Takes messages and timeout signals as input
//! - Produces a new state and the messages to broadcast as output
//! - No I/O, no clocks, no randomness
//!
//! # Protocol Overview
//!
//! ## Optimistic Path
//!
//! ```text
//! Client ──Request──► All
//!                      │
//! Primary ──PrePrepare──► All (including itself)
//!                      │
//! Replica ──Commit─────► All
//!                      │
//!                      ▼ (3f+1 commits)
//! Replica ──Reply──────► All            (Decided)
//! ```
//!
//! ## Fallback (on timeout)
//!
//! ```text
//! Replica ──CpPreVote(r, Yes|No)──► All
//!           │
//!           ├─ 2f+1 No  ──► Reply (decided)
//!           ▼ (2f+1 pre-votes)
//! Replica ──CpMainVote(r, Yes|Abstain)──► All
//!           │
//!           ├─ 2f+1 Yes ──► Commit(null) in view + 1
//!           ▼ (otherwise)
//!         round r + 1
//! ```
//!
//! Every broadcast is also delivered to the sending replica, synchronously
//! and before anything else is processed.
//!
//! # Key Types
//!
//! - [`Replica`]: The state machine
//! - [`ReplicaEvent`]: Inputs that can trigger transitions
//! - [`ReplicaOutput`]: What a transition produced

mod fallback;
mod normal;
mod state;

pub use state::{PreVote, Replica};

use crate::message::Message;
use crate::types::{Value, ViewNumber};

// ============================================================================
// Replica Output
// ============================================================================

/// A decision reached by a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// The view the replica was in when it decided.
    pub view: ViewNumber,

    /// The decided value. `None` when the deciding message carried none.
    pub value: Option<Value>,
}

/// Output produced by the replica state machine.
///
/// The caller (runtime) is responsible for handing every message to the
/// transport. Self-delivery has already been applied.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplicaOutput {
    /// Messages broadcast by this replica, in emission order.
    pub messages: Vec<Message>,

    /// If Some, the replica entered (or re-entered) the decided phase.
    pub decision: Option<Decision>,

    /// The replica finished a fallback round without a quorum and waits for
    /// [`ReplicaEvent::AdvanceRound`].
    pub round_pending: bool,
}

impl ReplicaOutput {
    /// Creates an empty output.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates output with a single broadcast message.
    pub fn with_message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Self::default()
        }
    }

    /// Attaches the decision this transition reached.
    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Returns true if the transition produced nothing observable.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.decision.is_none() && !self.round_pending
    }

    /// Merges another output into this one. The later decision wins.
    pub fn merge(&mut self, other: ReplicaOutput) {
        self.messages.extend(other.messages);
        if other.decision.is_some() {
            self.decision = other.decision;
        }
        self.round_pending |= other.round_pending;
    }
}

// ============================================================================
// Replica Event
// ============================================================================

/// Events that can trigger replica state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaEvent {
    /// A message arrived from the network (or from a client).
    Message(Message),

    /// The external timer fired: abandon the optimistic path.
    Timeout,

    /// Start the pending fallback round (only meaningful with
    /// [`crate::FallbackAdvance::External`]).
    AdvanceRound,
}
