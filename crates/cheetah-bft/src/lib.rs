//! # cheetah-bft: Optimistic BFT agreement with a biased fallback
//!
//! This crate implements the per-replica logic of a Byzantine-fault-tolerant
//! agreement protocol for a single consensus instance. It tolerates `f`
//! faulty replicas out of `N ≥ 3f+1`.
//!
//! ## Protocol
//!
//! - **Optimistic path**: the primary proposes a client value with
//!   `PrePrepare`; every replica answers with `Commit`; a replica that sees
//!   commits from all `3f+1` replicas decides and broadcasts `Reply`.
//! - **Fallback**: on an external timeout, replicas run rounds of a biased
//!   binary agreement (pre-vote, then main vote) over whether to abandon the
//!   current view. A `Yes` quorum moves everyone into the next view's commit
//!   phase; a `No` quorum of pre-votes ends the instance.
//!
//! ## Architecture
//!
//! The replica follows the Functional Core / Imperative Shell pattern:
//!
//! - [`Replica`] is a pure state machine: `process(event) -> (new_state, output)`
//! - [`Node`] is a thin driver that hands each output message to a
//!   [`Transport`]
//! - Timers, networking and clocks live outside the crate
//!
//! Every broadcast is delivered to the sending replica synchronously, before
//! the call returns.
//!
//! ## Example
//!
//! ```
//! use cheetah_bft::{
//!     ClusterConfig, Message, Replica, ReplicaId, ReplicaOptions, Value, ViewNumber,
//! };
//!
//! let config = ClusterConfig::new(4, 1).expect("4 replicas tolerate 1 fault");
//! let primary = Replica::new(ReplicaId::new(0), config, ReplicaOptions::default());
//!
//! let request = Message::request(ReplicaId::new(0), ViewNumber::ZERO, Value::new(42));
//! let (primary, output) = primary.handle(request);
//!
//! // PrePrepare(42), then the primary's own Commit(42).
//! assert_eq!(output.messages.len(), 2);
//! assert_eq!(primary.committed_count(), 1);
//! ```

mod config;
mod message;
mod node;
mod quorum;
mod replica;
mod types;


// Re-export public API
pub use config::{
    ClusterConfig, ClusterConfigError, FallbackAdvance, MAX_CLUSTER_SIZE, PrimarySelection,
    ReplicaOptions,
};
pub use message::{Message, MessageError, MessageKind, MessagePayload};
pub use node::{Node, NodeStep, Transport};
pub use quorum::{RoundVotes, VoteTracker};
pub use replica::{Decision, PreVote, Replica, ReplicaEvent, ReplicaOutput};
pub use types::{BinaryVote, Phase, ReplicaId, RoundNumber, Value, ViewNumber};
