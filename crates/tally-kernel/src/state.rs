//! Kernel state management.
//!
//! The kernel keeps, per initialized quorum, three stores that must agree
//! with each other after every command:
//!
//! - the count history (`CheckpointLog<u32>`),
//! - one occupant history per index slot (`CheckpointLog<Occupant>`),
//! - the reverse index map from member to current slot.
//!
//! Quorum-level transitions take ownership of `self` and return the new
//! state (builder pattern). Per-quorum writes happen in place and only after
//! the kernel has validated the whole command, so they cannot fail.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_types::{MemberId, Occupant, QuorumId, Timestamp};

use crate::checkpoint::CheckpointLog;

// ============================================================================
// Limits
// ============================================================================

/// Static bounds enforced by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Limits {
    /// Maximum number of members a single quorum may hold. `None` is
    /// unbounded.
    pub max_members_per_quorum: Option<u32>,
}

impl Limits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_members_per_quorum(mut self, max: u32) -> Self {
        self.max_members_per_quorum = Some(max);
        self
    }
}

// ============================================================================
// Per-Quorum State
// ============================================================================

/// Histories and reverse index of one quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumState {
    count_history: CheckpointLog<u32>,
    /// Indexed by slot. A slot's log is created the first time the slot is
    /// reached and kept forever after.
    slot_histories: Vec<CheckpointLog<Occupant>>,
    index_map: BTreeMap<MemberId, u32>,
}

impl QuorumState {
    /// Creates a quorum whose count history starts at `(at, 0)`.
    fn initialized(at: Timestamp) -> Self {
        Self {
            count_history: CheckpointLog::starting_at(at, 0),
            slot_histories: Vec::new(),
            index_map: BTreeMap::new(),
        }
    }

    /// Returns the current member count.
    pub fn count(&self) -> u32 {
        self.count_history.latest().copied().unwrap_or_default()
    }

    pub fn count_history(&self) -> &CheckpointLog<u32> {
        &self.count_history
    }

    /// Returns the occupant history of a slot, if the slot was ever used.
    pub fn slot_history(&self, index: u32) -> Option<&CheckpointLog<Occupant>> {
        self.slot_histories.get(index as usize)
    }

    /// Returns all slot histories, by index.
    pub fn slot_histories(&self) -> &[CheckpointLog<Occupant>] {
        &self.slot_histories
    }

    /// Returns who currently holds `index`.
    pub fn occupant(&self, index: u32) -> Option<&Occupant> {
        self.slot_history(index).and_then(CheckpointLog::latest)
    }

    /// Returns the current index of `member`.
    pub fn index_of(&self, member: &MemberId) -> Option<u32> {
        self.index_map.get(member).copied()
    }

    pub fn index_map(&self) -> &BTreeMap<MemberId, u32> {
        &self.index_map
    }

    /// Returns the current members ordered by index.
    pub fn members(&self) -> Vec<MemberId> {
        (0..self.count())
            .filter_map(|i| self.occupant(i).and_then(Occupant::member).cloned())
            .collect()
    }

    /// Returns the member count in effect at `at`.
    pub fn count_at(&self, at: Timestamp) -> Option<u32> {
        self.count_history.value_at(at).copied()
    }

    /// Returns who held `index` at `at`.
    pub fn occupant_at(&self, index: u32, at: Timestamp) -> Option<&Occupant> {
        self.slot_history(index).and_then(|log| log.value_at(at))
    }

    /// Returns the members at `at`, ordered by the index they held.
    ///
    /// This is the member set an observer needs to reconstruct a signer set
    /// from the past.
    pub fn members_at(&self, at: Timestamp) -> Option<Vec<MemberId>> {
        let count = self.count_at(at)?;
        Some(
            (0..count)
                .filter_map(|i| self.occupant_at(i, at).and_then(Occupant::member).cloned())
                .collect(),
        )
    }

    // ------------------------------------------------------------------------
    // Mutations (kernel-internal)
    // ------------------------------------------------------------------------

    /// Records `count` at `at`.
    ///
    /// `at` must be no older than the latest entry; the kernel checks every
    /// command against `last_applied` before any write.
    pub(crate) fn record_count(&mut self, at: Timestamp, count: u32) {
        if let Err(regression) = self.count_history.append_or_coalesce(at, count) {
            unreachable!("validated command regressed a count history: {regression}");
        }
    }

    /// Records `occupant` in slot `index`, creating the slot's log if this
    /// is the first time the slot is reached. Same timestamp rule as
    /// [`Self::record_count`].
    pub(crate) fn record_occupant(&mut self, index: u32, at: Timestamp, occupant: Occupant) {
        let slot = index as usize;
        // Slots are reached in order; a new slot is always the next one.
        assert!(
            slot <= self.slot_histories.len(),
            "slot {slot} skips past {} existing slots",
            self.slot_histories.len()
        );
        if slot == self.slot_histories.len() {
            self.slot_histories.push(CheckpointLog::new());
        }
        if let Err(regression) = self.slot_histories[slot].append_or_coalesce(at, occupant) {
            unreachable!("validated command regressed slot {slot}: {regression}");
        }
    }

    pub(crate) fn set_index(&mut self, member: MemberId, index: u32) {
        self.index_map.insert(member, index);
    }

    pub(crate) fn remove_index(&mut self, member: &MemberId) -> Option<u32> {
        self.index_map.remove(member)
    }
}

// ============================================================================
// Kernel State
// ============================================================================

/// The kernel's in-memory state.
///
/// State uses a builder pattern - methods take ownership of `self`, mutate,
/// and return `self`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct State {
    quorums: BTreeMap<QuorumId, QuorumState>,
    limits: Limits,
    /// Timestamp of the last applied command.
    last_applied: Option<Timestamp>,
}

impl State {
    /// Creates a new empty state with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty state with the given limits.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Returns the timestamp of the last applied command.
    pub fn last_applied(&self) -> Option<Timestamp> {
        self.last_applied
    }

    /// Returns true once any quorum has been initialized.
    pub fn is_initialized(&self) -> bool {
        !self.quorums.is_empty()
    }

    /// Returns true if `quorum` has a count history.
    pub fn is_quorum_initialized(&self, quorum: QuorumId) -> bool {
        self.quorums
            .get(&quorum)
            .is_some_and(|q| q.count_history.is_initialized())
    }

    /// Returns the state of a quorum, if it was initialized.
    pub fn quorum(&self, quorum: QuorumId) -> Option<&QuorumState> {
        self.quorums.get(&quorum)
    }

    /// Returns all initialized quorums, sorted by id.
    pub fn quorums(&self) -> &BTreeMap<QuorumId, QuorumState> {
        &self.quorums
    }

    pub fn quorum_count(&self) -> usize {
        self.quorums.len()
    }

    /// Returns the current member count of `quorum`.
    pub fn member_count(&self, quorum: QuorumId) -> Option<u32> {
        self.quorum(quorum).map(QuorumState::count)
    }

    /// Returns the current index of `member` in `quorum`.
    pub fn current_index(&self, quorum: QuorumId, member: &MemberId) -> Option<u32> {
        self.quorum(quorum).and_then(|q| q.index_of(member))
    }

    /// Returns the current members of `quorum`, ordered by index.
    pub fn current_members(&self, quorum: QuorumId) -> Option<Vec<MemberId>> {
        self.quorum(quorum).map(QuorumState::members)
    }

    /// Returns the member count of `quorum` at `at`.
    pub fn count_at(&self, quorum: QuorumId, at: Timestamp) -> Option<u32> {
        self.quorum(quorum).and_then(|q| q.count_at(at))
    }

    /// Returns who held `index` in `quorum` at `at`.
    pub fn occupant_at(&self, quorum: QuorumId, index: u32, at: Timestamp) -> Option<&Occupant> {
        self.quorum(quorum).and_then(|q| q.occupant_at(index, at))
    }

    /// Returns the members of `quorum` at `at`, ordered by index.
    pub fn members_at(&self, quorum: QuorumId, at: Timestamp) -> Option<Vec<MemberId>> {
        self.quorum(quorum).and_then(|q| q.members_at(at))
    }

    // ------------------------------------------------------------------------
    // Transitions (kernel-internal)
    // ------------------------------------------------------------------------

    /// Adds a freshly initialized quorum.
    ///
    /// Internal to the kernel - external code should use `apply_committed`
    /// which handles validation and effects.
    pub(crate) fn with_quorum(mut self, quorum: QuorumId, at: Timestamp) -> Self {
        self.quorums.insert(quorum, QuorumState::initialized(at));
        self
    }

    pub(crate) fn with_last_applied(mut self, at: Timestamp) -> Self {
        self.last_applied = Some(at);
        self
    }

    pub(crate) fn quorum_mut(&mut self, quorum: QuorumId) -> Option<&mut QuorumState> {
        self.quorums.get_mut(&quorum)
    }
}
