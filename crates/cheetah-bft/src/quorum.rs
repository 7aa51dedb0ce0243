//! Distinct-sender vote counting.
//!
//! A [`VoteTracker`] keeps at most one vote per sender (last write wins),
//! so a replica repeating itself never moves a count closer to a threshold.
//! Iteration is in ascending sender order, which keeps every replica's
//! choice of "any received vote" deterministic.

use std::collections::BTreeMap;

use crate::types::{ReplicaId, RoundNumber};

/// Votes of one category for one view or round, keyed by sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTracker<M> {
    votes: BTreeMap<ReplicaId, M>,
}

impl<M> Default for VoteTracker<M> {
    fn default() -> Self {
        Self {
            votes: BTreeMap::new(),
        }
    }
}

impl<M> VoteTracker<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `vote` from `from`, replacing any earlier vote by the same
    /// sender. Returns true if the sender had not voted before.
    pub fn record(&mut self, from: ReplicaId, vote: M) -> bool {
        self.votes.insert(from, vote).is_none()
    }

    /// Number of distinct senders.
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Returns true once at least `threshold` distinct senders voted.
    pub fn reaches(&self, threshold: usize) -> bool {
        self.votes.len() >= threshold
    }

    /// Counts votes matching `pred`.
    pub fn count(&self, mut pred: impl FnMut(&M) -> bool) -> usize {
        self.votes.values().filter(|vote| pred(vote)).count()
    }

    /// Returns the vote of the lowest-numbered sender.
    pub fn first(&self) -> Option<&M> {
        self.votes.values().next()
    }

    pub fn get(&self, from: ReplicaId) -> Option<&M> {
        self.votes.get(&from)
    }

    pub fn contains(&self, from: ReplicaId) -> bool {
        self.votes.contains_key(&from)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReplicaId, &M)> {
        self.votes.iter().map(|(id, vote)| (*id, vote))
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }
}

/// Per-round vote trackers, indexed by round number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundVotes<M> {
    rounds: Vec<VoteTracker<M>>,
}

impl<M> Default for RoundVotes<M> {
    fn default() -> Self {
        Self { rounds: Vec::new() }
    }
}

impl<M> RoundVotes<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `round` the latest round.
    ///
    /// Votes already recorded for `round` are kept, entries for later
    /// rounds are discarded and missing earlier rounds are filled with empty
    /// trackers, so the tracker for round `r` always lives at index `r`.
    pub fn open_round(&mut self, round: RoundNumber) {
        let index = round.as_index();
        self.rounds.truncate(index + 1);
        if self.rounds.len() <= index {
            self.rounds.resize_with(index + 1, VoteTracker::new);
        }
    }

    pub fn get(&self, round: RoundNumber) -> Option<&VoteTracker<M>> {
        self.rounds.get(round.as_index())
    }

    pub fn get_mut(&mut self, round: RoundNumber) -> Option<&mut VoteTracker<M>> {
        self.rounds.get_mut(round.as_index())
    }

    /// Number of rounds started since the last clear.
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn clear(&mut self) {
        self.rounds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ReplicaId {
        ReplicaId::new(n)
    }

    #[test]
    fn duplicate_sender_does_not_increase_count() {
        let mut tracker = VoteTracker::new();
        assert!(tracker.record(id(1), "a"));
        assert!(!tracker.record(id(1), "b"));

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(id(1)), Some(&"b"));
    }

    #[test]
    fn reaches_threshold_with_distinct_senders() {
        let mut tracker = VoteTracker::new();
        for n in 0..3 {
            assert!(!tracker.reaches(3));
            tracker.record(id(n), ());
        }
        assert!(tracker.reaches(3));
        assert!(!tracker.reaches(4));
    }

    #[test]
    fn first_is_lowest_sender() {
        let mut tracker = VoteTracker::new();
        tracker.record(id(3), 30);
        tracker.record(id(1), 10);
        tracker.record(id(2), 20);

        assert_eq!(tracker.first(), Some(&10));
        assert_eq!(tracker.count(|v| *v >= 20), 2);
    }

    #[test]
    fn open_round_keeps_index_aligned() {
        let mut rounds: RoundVotes<u8> = RoundVotes::new();
        rounds.open_round(RoundNumber::ZERO);
        rounds.get_mut(RoundNumber::ZERO).unwrap().record(id(0), 1);

        // Reopening the current round keeps what it already collected.
        rounds.open_round(RoundNumber::ZERO);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds.get(RoundNumber::ZERO).unwrap().len(), 1);

        // Jumping ahead fills the gap.
        rounds.open_round(RoundNumber::new(2));
        assert_eq!(rounds.len(), 3);
        assert!(rounds.get(RoundNumber::new(1)).unwrap().is_empty());
        assert!(rounds.get(RoundNumber::new(3)).is_none());

        // Going back discards later rounds.
        rounds.open_round(RoundNumber::new(1));
        assert_eq!(rounds.len(), 2);
    }

    #[test]
    fn open_round_preserves_earlier_rounds() {
        let mut rounds: RoundVotes<u8> = RoundVotes::new();
        rounds.open_round(RoundNumber::ZERO);
        rounds.get_mut(RoundNumber::ZERO).unwrap().record(id(1), 7);
        rounds.open_round(RoundNumber::new(1));

        assert_eq!(
            rounds.get(RoundNumber::ZERO).unwrap().get(id(1)),
            Some(&7)
        );
    }
}
