//! Protocol messages.
//!
//! ## Optimistic path
//! - [`MessagePayload::Request`] - Client → All: Please agree on this value
//! - [`MessagePayload::PrePrepare`] - Primary → All: Proposal for the view
//! - [`MessagePayload::Commit`] - Replica → All: I accept the proposal
//! - [`MessagePayload::Reply`] - Replica → All: Decided (checkpoint)
//!
//! ## Fallback agreement
//! - [`MessagePayload::CpPreVote`] - Replica → All: My proposal for this round
//! - [`MessagePayload::CpMainVote`] - Replica → All: What the pre-votes showed
//! - [`MessagePayload::CpDecide`] - Reserved; replicas accept and drop it
//!
//! Every message is stamped with the sender and the sender's current view.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BinaryVote, ReplicaId, RoundNumber, Value, ViewNumber};

/// Errors from encoding or decoding messages.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to encode message: {0}")]
    Encode(postcard::Error),

    #[error("failed to decode message: {0}")]
    Decode(postcard::Error),
}

// ============================================================================
// Message Envelope
// ============================================================================

/// A protocol message together with its sender and view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The replica (or client) that sent this message.
    pub from: ReplicaId,

    /// The sender's view when the message was created.
    pub view: ViewNumber,

    pub payload: MessagePayload,
}

impl Message {
    pub fn new(from: ReplicaId, view: ViewNumber, payload: MessagePayload) -> Self {
        Self {
            from,
            view,
            payload,
        }
    }

    /// A client request for `value`, addressed to replicas in `view`.
    pub fn request(from: ReplicaId, view: ViewNumber, value: Value) -> Self {
        Self::new(from, view, MessagePayload::Request { value })
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Encodes the message with postcard's canonical, deterministic format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        postcard::to_allocvec(self).map_err(MessageError::Encode)
    }

    /// Decodes a message produced by [`Message::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        postcard::from_bytes(bytes).map_err(MessageError::Decode)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} in view {}", self.payload, self.from, self.view)
    }
}

// ============================================================================
// Message Payload
// ============================================================================

/// The payload of a protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePayload {
    // === Optimistic Path ===
    /// Client → All: Please agree on this value.
    Request { value: Value },

    /// Primary → All: The value proposed for this view.
    PrePrepare { value: Value },

    /// Replica → All: I accept the proposal.
    ///
    /// `None` after the fallback moves the cluster into a new view.
    Commit { value: Option<Value> },

    /// Replica → All: A decision was reached. Accepted in every phase.
    Reply { value: Option<Value> },

    // === Fallback Agreement ===
    /// Replica → All: My proposal for this round.
    ///
    /// `value` travels with the vote and becomes the decided value if this
    /// vote completes a quorum of `No`. Correct replicas send `None`.
    CpPreVote {
        round: RoundNumber,
        vote: BinaryVote,
        value: Option<Value>,
    },

    /// Replica → All: `Yes` if I saw a `Yes` pre-vote quorum, else `Abstain`.
    CpMainVote { round: RoundNumber, vote: BinaryVote },

    /// Reserved round-level decision announcement.
    CpDecide { round: RoundNumber, vote: BinaryVote },
}

/// Payload discriminant, for logging and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Request,
    PrePrepare,
    Commit,
    Reply,
    CpPreVote,
    CpMainVote,
    CpDecide,
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::Request { .. } => MessageKind::Request,
            MessagePayload::PrePrepare { .. } => MessageKind::PrePrepare,
            MessagePayload::Commit { .. } => MessageKind::Commit,
            MessagePayload::Reply { .. } => MessageKind::Reply,
            MessagePayload::CpPreVote { .. } => MessageKind::CpPreVote,
            MessagePayload::CpMainVote { .. } => MessageKind::CpMainVote,
            MessagePayload::CpDecide { .. } => MessageKind::CpDecide,
        }
    }

    /// Returns the wire-style name of the payload.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Returns the fallback round this payload is tagged with, if any.
    pub fn round(&self) -> Option<RoundNumber> {
        match self {
            MessagePayload::CpPreVote { round, .. }
            | MessagePayload::CpMainVote { round, .. }
            | MessagePayload::CpDecide { round, .. } => Some(*round),
            MessagePayload::Request { .. }
            | MessagePayload::PrePrepare { .. }
            | MessagePayload::Commit { .. }
            | MessagePayload::Reply { .. } => None,
        }
    }

    /// Returns the vote carried by a fallback payload, if any.
    pub fn vote(&self) -> Option<BinaryVote> {
        match self {
            MessagePayload::CpPreVote { vote, .. }
            | MessagePayload::CpMainVote { vote, .. }
            | MessagePayload::CpDecide { vote, .. } => Some(*vote),
            _ => None,
        }
    }
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::Request,
        MessageKind::PrePrepare,
        MessageKind::Commit,
        MessageKind::Reply,
        MessageKind::CpPreVote,
        MessageKind::CpMainVote,
        MessageKind::CpDecide,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Request => "REQUEST",
            MessageKind::PrePrepare => "PRE-PREPARE",
            MessageKind::Commit => "COMMIT",
            MessageKind::Reply => "REPLY",
            MessageKind::CpPreVote => "CP:PRE-VOTE",
            MessageKind::CpMainVote => "CP:MAIN-VOTE",
            MessageKind::CpDecide => "CP:DECIDE",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for MessagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagePayload::Request { value } | MessagePayload::PrePrepare { value } => {
                write!(f, "<<{}>>({value})", self.name())
            }
            MessagePayload::Commit { value } | MessagePayload::Reply { value } => match value {
                Some(value) => write!(f, "<<{}>>({value})", self.name()),
                None => write!(f, "<<{}>>(null)", self.name()),
            },
            MessagePayload::CpPreVote { round, vote, .. }
            | MessagePayload::CpMainVote { round, vote }
            | MessagePayload::CpDecide { round, vote } => {
                write!(f, "<<{}>>(round {round}, {vote})", self.name())
            }
        }
    }
}
