//! Transport seam and node driver.
//!
//! [`Replica`] is a pure state machine that returns the messages it wants
//! broadcast. [`Node`] owns a replica and a [`Transport`], feeds events
//! into the replica, and hands every emitted message to the transport.
//! Self-delivery has already happened inside the replica, so transports
//! should not loop a node's messages back to it.

use crate::config::{ClusterConfig, ReplicaOptions};
use crate::message::Message;
use crate::replica::{Decision, Replica, ReplicaEvent, ReplicaOutput};
use crate::types::ReplicaId;

// ============================================================================
// Transport Trait
// ============================================================================

/// Broadcast primitive provided by the surrounding system.
///
/// Implementations deliver `message` to every other replica eventually. No
/// ordering is required and no acknowledgment is returned.
pub trait Transport {
    fn broadcast(&mut self, message: &Message);
}

/// Collects broadcasts in order. Useful for tests and tooling.
impl Transport for Vec<Message> {
    fn broadcast(&mut self, message: &Message) {
        self.push(message.clone());
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn broadcast(&mut self, message: &Message) {
        (**self).broadcast(message);
    }
}

// ============================================================================
// Node
// ============================================================================

/// What one driven event produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStep {
    /// Set when the replica entered the decided phase during this step.
    pub decided: Option<Decision>,

    /// Set when a fallback round is waiting for [`Node::advance_round`].
    pub round_pending: bool,

    /// Number of messages handed to the transport.
    pub sent: usize,
}

/// A replica bound to a transport.
#[derive(Debug)]
pub struct Node<T> {
    replica: Replica,
    transport: T,
}

impl<T: Transport> Node<T> {
    pub fn new(
        replica_id: ReplicaId,
        config: ClusterConfig,
        options: ReplicaOptions,
        transport: T,
    ) -> Self {
        Self::from_replica(Replica::new(replica_id, config, options), transport)
    }

    pub fn from_replica(replica: Replica, transport: T) -> Self {
        Self {
            replica,
            transport,
        }
    }

    /// Returns the replica's current state.
    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the node, returning the replica and transport.
    pub fn into_parts(self) -> (Replica, T) {
        (self.replica, self.transport)
    }

    /// Delivers a message from the network.
    pub fn deliver(&mut self, message: Message) -> NodeStep {
        self.drive(ReplicaEvent::Message(message))
    }

    /// Fires the optimistic-path timeout.
    pub fn timeout(&mut self) -> NodeStep {
        self.drive(ReplicaEvent::Timeout)
    }

    /// Starts a pending fallback round.
    pub fn advance_round(&mut self) -> NodeStep {
        self.drive(ReplicaEvent::AdvanceRound)
    }

    fn drive(&mut self, event: ReplicaEvent) -> NodeStep {
        let (new_state, output) = self.replica.clone().process(event);
        self.replica = new_state;
        self.dispatch(output)
    }

    fn dispatch(&mut self, output: ReplicaOutput) -> NodeStep {
        let ReplicaOutput {
            messages,
            decision,
            round_pending,
        } = output;

        for message in &messages {
            self.transport.broadcast(message);
        }

        NodeStep {
            decided: decision,
            round_pending,
            sent: messages.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessagePayload;
    use crate::types::{Phase, Value, ViewNumber};

    fn node(id: u8) -> Node<Vec<Message>> {
        Node::new(
            ReplicaId::new(id),
            ClusterConfig::minimal(1).unwrap(),
            ReplicaOptions::default(),
            Vec::new(),
        )
    }

    #[test]
    fn primary_forwards_pre_prepare_and_commit() {
        let mut primary = node(0);
        let step = primary.deliver(Message::request(
            ReplicaId::new(0),
            ViewNumber::ZERO,
            Value::new(42),
        ));

        assert_eq!(step.sent, 2);
        assert!(step.decided.is_none());
        let kinds: Vec<_> = primary.transport().iter().map(Message::kind).collect();
        assert_eq!(
            kinds,
            vec![
                crate::MessageKind::PrePrepare,
                crate::MessageKind::Commit
            ]
        );
        assert_eq!(primary.replica().phase(), Phase::Commit);
    }

    #[test]
    fn backup_sends_nothing_on_request() {
        let mut backup = node(2);
        let step = backup.deliver(Message::request(
            ReplicaId::new(0),
            ViewNumber::ZERO,
            Value::new(42),
        ));

        assert_eq!(step, NodeStep::default());
        assert!(backup.transport().is_empty());
        assert_eq!(backup.replica().phase(), Phase::PrePrepare);
    }

    #[test]
    fn reply_reports_decision() {
        let mut backup = node(1);
        let step = backup.deliver(Message::new(
            ReplicaId::new(3),
            ViewNumber::ZERO,
            MessagePayload::Reply {
                value: Some(Value::new(7)),
            },
        ));

        let decided = step.decided.expect("reply decides");
        assert_eq!(decided.value, Some(Value::new(7)));
        assert_eq!(step.sent, 0);

        let (replica, sent) = backup.into_parts();
        assert!(replica.is_decided());
        assert!(sent.is_empty());
    }
}
