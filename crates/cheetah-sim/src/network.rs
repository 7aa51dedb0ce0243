//! Simulated network with deterministic ordering and message loss.
//!
//! Every broadcast is encoded once with the wire codec and fanned out to
//! every replica except the sender (which already delivered it to itself).
//! Envelopes wait in a single queue:
//!
//! - **FIFO** (default): global send order, the simplest schedule that
//!   still interleaves replicas.
//! - **Reorder**: the next envelope is chosen uniformly at random, which
//!   models arbitrary asynchronous delivery.
//!
//! Loss is applied at send time, per recipient.

use std::collections::VecDeque;

use cheetah_bft::{Message, MessageKind, ReplicaId};
use serde::{Deserialize, Serialize};

use crate::SimRng;
use crate::error::SimError;

/// Configuration for the simulated network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Deliver in uniformly random order instead of FIFO.
    pub reorder: bool,
    /// Probability (0.0 - 1.0) that an envelope is lost.
    pub drop_probability: f64,
    /// Kinds subject to loss. Empty means every kind.
    pub drop_kinds: Vec<MessageKind>,
}

impl NetworkConfig {
    pub fn with_reorder(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    /// Drops `kinds` (or everything, if empty) with `probability`.
    pub fn with_drops(mut self, probability: f64, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        self.drop_probability = probability.clamp(0.0, 1.0);
        self.drop_kinds = kinds.into_iter().collect();
        self
    }

    fn may_drop(&self, kind: MessageKind) -> bool {
        self.drop_probability > 0.0
            && (self.drop_kinds.is_empty() || self.drop_kinds.contains(&kind))
    }
}

/// Network statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Envelopes accepted for delivery.
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// An encoded message addressed to one replica.
#[derive(Debug, Clone)]
struct Envelope {
    to: ReplicaId,
    kind: MessageKind,
    bytes: Vec<u8>,
}

/// A message taken off the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ReplicaId,
    pub message: Message,
}

/// Simulated network for deterministic message delivery.
#[derive(Debug)]
pub struct SimNetwork {
    config: NetworkConfig,
    cluster_size: usize,
    queue: VecDeque<Envelope>,
    stats: NetworkStats,
}

impl SimNetwork {
    pub fn new(config: NetworkConfig, cluster_size: usize) -> Self {
        Self {
            config,
            cluster_size,
            queue: VecDeque::new(),
            stats: NetworkStats::default(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Fans `message` out to every replica but its sender.
    pub fn broadcast(&mut self, message: &Message, rng: &mut SimRng) -> Result<(), SimError> {
        let kind = message.kind();
        let bytes = message.to_bytes()?;

        for to in (0..self.cluster_size).map(|i| ReplicaId::new(i as u8)) {
            if to == message.from {
                continue;
            }

            if self.config.may_drop(kind) && rng.next_bool_with_probability(self.config.drop_probability) {
                self.stats.dropped += 1;
                tracing::trace!(from = %message.from, to = %to, kind = %kind, "dropped envelope");
                continue;
            }

            self.stats.sent += 1;
            self.queue.push_back(Envelope {
                to,
                kind,
                bytes: bytes.clone(),
            });
        }
        Ok(())
    }

    /// Takes the next envelope off the network and decodes it.
    pub fn deliver_next(&mut self, rng: &mut SimRng) -> Result<Option<Delivery>, SimError> {
        let envelope = if self.config.reorder && !self.queue.is_empty() {
            let index = rng.next_usize(self.queue.len());
            self.queue.remove(index)
        } else {
            self.queue.pop_front()
        };

        let Some(envelope) = envelope else {
            return Ok(None);
        };

        let message = Message::from_bytes(&envelope.bytes)?;
        debug_assert_eq!(message.kind(), envelope.kind);
        self.stats.delivered += 1;

        Ok(Some(Delivery {
            to: envelope.to,
            message,
        }))
    }

    /// Number of envelopes in flight.
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }
}
