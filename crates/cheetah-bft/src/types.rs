//! Core protocol identifiers and small value types.
//!
//! All identifiers are `Copy` newtypes so they can be passed around freely
//! and cannot be confused with one another (a view is not a round).

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers - All Copy
// ============================================================================

/// Identifier of a replica (or of a client submitting requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(u8);

impl ReplicaId {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ReplicaId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<ReplicaId> for u8 {
    fn from(id: ReplicaId) -> Self {
        id.0
    }
}

/// A view number. Views only move forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ViewNumber(u64);

impl ViewNumber {
    pub const ZERO: ViewNumber = ViewNumber(0);

    pub const fn new(view: u64) -> Self {
        Self(view)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the view that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for ViewNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ViewNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A round of the fallback binary agreement.
///
/// Rounds restart from zero whenever the fallback converges into a new view.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct RoundNumber(u64);

impl RoundNumber {
    pub const ZERO: RoundNumber = RoundNumber(0);

    pub const fn new(round: u64) -> Self {
        Self(round)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn as_index(self) -> usize {
        self.0 as usize
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the previous round, or `None` for round zero.
    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl Display for RoundNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RoundNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// An opaque client value being agreed upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Value(u64);

impl Value {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The vote alphabet of the fallback binary agreement.
///
/// `Yes` means "abandon the current view", `No` means "stay". `Abstain` is
/// only ever cast as a main vote, when a replica saw no pre-vote quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryVote {
    Yes,
    No,
    Abstain,
}

impl Display for BinaryVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryVote::Yes => "Yes",
            BinaryVote::No => "No",
            BinaryVote::Abstain => "Abstain",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Phase
// ============================================================================

/// The phase a replica is in. Exactly one phase is active at a time.
///
/// ```text
/// Idle ──► PrePrepare ──► Commit ──► Decided
///                           │  ▲
///                 timeout   ▼  │ 2f+1 Yes main votes (view + 1)
///                       CpPreVote ◄──┐
///                           │        │ no main-vote quorum (round + 1)
///                           ▼        │
///                       CpMainVote ──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    PrePrepare,
    Commit,
    Decided,
    CpPreVote,
    CpMainVote,
}

impl Phase {
    /// Returns true while the replica runs the fallback agreement.
    pub fn is_fallback(self) -> bool {
        matches!(self, Phase::CpPreVote | Phase::CpMainVote)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "IDLE",
            Phase::PrePrepare => "PRE-PREPARE",
            Phase::Commit => "COMMIT",
            Phase::Decided => "DECIDED",
            Phase::CpPreVote => "CP:PRE-VOTE",
            Phase::CpMainVote => "CP:MAIN-VOTE",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_previous_saturates_at_zero() {
        assert_eq!(RoundNumber::ZERO.previous(), None);
        assert_eq!(RoundNumber::new(3).previous(), Some(RoundNumber::new(2)));
    }

    #[test]
    fn view_next_is_monotonic() {
        let view = ViewNumber::new(7);
        assert!(view.next() > view);
        assert_eq!(view.next().as_u64(), 8);
    }

    #[test]
    fn phase_display_matches_log_names() {
        assert_eq!(Phase::CpPreVote.to_string(), "CP:PRE-VOTE");
        assert_eq!(Phase::PrePrepare.to_string(), "PRE-PREPARE");
        assert!(Phase::CpMainVote.is_fallback());
        assert!(!Phase::Commit.is_fallback());
    }
}
