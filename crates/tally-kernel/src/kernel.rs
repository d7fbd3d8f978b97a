//! The kernel - pure functional core of `Tally`.
//!
//! The kernel applies committed commands to produce new state and effects.
//! It is completely pure: no IO, no clocks, no randomness. Every command is
//! validated in full before its first write, which is what makes
//! multi-quorum commands atomic without copying the state: a rejected
//! command never touches it.
//!
//! # Example
//!
//! ```
//! use tally_kernel::{Command, State, apply_committed};
//! use tally_types::{QuorumId, Timestamp};
//!
//! let q = QuorumId::new(0);
//! let at = Timestamp::from_secs(100);
//!
//! let (state, _) = apply_committed(State::new(), Command::init_quorum(q, at)).unwrap();
//! let (state, effects) =
//!     apply_committed(state, Command::register_operator("alice", vec![q], at)).unwrap();
//!
//! assert_eq!(state.member_count(q), Some(1));
//! assert_eq!(effects.len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tally_types::{MemberId, Occupant, QuorumId, QuorumIndexUpdate, Timestamp};

use crate::checkpoint::ClockRegression;
use crate::command::Command;
use crate::effects::Effect;
use crate::state::{QuorumState, State};

/// Applies a committed command to the state, producing new state and effects.
///
/// Takes ownership of state, returns new state. Quorums listed in a command
/// are processed in order and the first failure aborts the whole command.
pub fn apply_committed(state: State, cmd: Command) -> Result<(State, Vec<Effect>), KernelError> {
    let mut state = state;
    let effects = apply_in_place(&mut state, cmd)?;
    Ok((state, effects))
}

/// Applies a committed command to `state` in place.
///
/// Every precondition is checked by [`validate`] before the first write, so
/// a rejected command leaves `state` exactly as it was. Cost is
/// proportional to the quorums the command names, never to the size of the
/// histories.
pub fn apply_in_place(state: &mut State, cmd: Command) -> Result<Vec<Effect>, KernelError> {
    validate(state, &cmd)?;
    Ok(apply_validated(state, cmd))
}

/// Applies a sequence of commands, all or nothing.
///
/// Effects are returned in command order. The first failing command aborts
/// the batch and the input state is lost, exactly as with a single command.
pub fn apply_committed_batch(
    state: State,
    commands: impl IntoIterator<Item = Command>,
) -> Result<(State, Vec<Effect>), KernelError> {
    let mut state = state;
    let mut all_effects = Vec::new();

    for cmd in commands {
        all_effects.extend(apply_in_place(&mut state, cmd)?);
    }

    Ok((state, all_effects))
}

/// Checks `cmd` against `state` without changing anything.
///
/// Reports the first failure in the order [`apply_committed`] would meet
/// it: the clock first, then each listed quorum in turn. A quorum listed
/// twice fails on its second occurrence as if the first had been applied.
pub fn validate(state: &State, cmd: &Command) -> Result<(), KernelError> {
    let at = cmd.timestamp();

    // Precondition: time never moves backwards across commands
    if let Some(last) = state.last_applied() {
        if at < last {
            return Err(ClockRegression {
                last,
                attempted: at,
            }
            .into());
        }
    }

    match cmd {
        Command::InitQuorum { quorum, .. } => {
            // Precondition: quorum not yet tracked
            if state.is_quorum_initialized(*quorum) {
                return Err(KernelError::QuorumAlreadyInitialized(*quorum));
            }
        }

        Command::RegisterOperator {
            member, quorums, ..
        } => {
            let max_members = state.limits().max_members_per_quorum;
            // Index each quorum would hand out, for duplicate detection
            let mut planned: BTreeMap<QuorumId, u32> = BTreeMap::new();

            for &quorum in quorums {
                let slots = state
                    .quorum(quorum)
                    .ok_or(KernelError::QuorumNotInitialized(quorum))?;

                // Precondition: a member holds at most one index per quorum
                if let Some(index) = slots
                    .index_of(member)
                    .or_else(|| planned.get(&quorum).copied())
                {
                    return Err(KernelError::MemberAlreadyRegistered {
                        quorum,
                        member: member.clone(),
                        index,
                    });
                }

                let count = slots.count();
                if let Some(max) = max_members {
                    if count >= max {
                        return Err(KernelError::QuorumFull { quorum, max });
                    }
                }
                if count == u32::MAX {
                    return Err(KernelError::QuorumFull {
                        quorum,
                        max: u32::MAX,
                    });
                }

                planned.insert(quorum, count);
            }
        }

        Command::DeregisterOperator {
            member, quorums, ..
        } => {
            let mut released: BTreeSet<QuorumId> = BTreeSet::new();

            for &quorum in quorums {
                let slots = state
                    .quorum(quorum)
                    .ok_or(KernelError::QuorumNotInitialized(quorum))?;

                if slots.index_of(member).is_none() || !released.insert(quorum) {
                    return Err(KernelError::MemberNotRegistered {
                        quorum,
                        member: member.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

/// Performs the writes of a command [`validate`] accepted.
fn apply_validated(state: &mut State, cmd: Command) -> Vec<Effect> {
    let at = cmd.timestamp();
    let mut effects = Vec::new();

    match cmd {
        Command::InitQuorum { quorum, at } => {
            *state = std::mem::take(state).with_quorum(quorum, at);

            // Postcondition: quorum starts empty
            assert_eq!(
                state.member_count(quorum),
                Some(0),
                "quorum {quorum} must start with zero members"
            );

            effects.push(Effect::QuorumInitialized { quorum, at });
        }

        Command::RegisterOperator {
            member,
            quorums,
            at,
        } => {
            for quorum in quorums {
                let index = assign_index(validated_quorum(state, quorum), &member, at);

                effects.push(Effect::EmitIndexUpdate(QuorumIndexUpdate {
                    member: member.clone(),
                    quorum,
                    index,
                }));
            }
        }

        Command::DeregisterOperator {
            member,
            quorums,
            at,
        } => {
            for quorum in quorums {
                let slots = validated_quorum(state, quorum);
                if let Some((moved, index)) = release_index(slots, quorum, &member, at) {
                    effects.push(Effect::EmitIndexUpdate(QuorumIndexUpdate {
                        member: moved,
                        quorum,
                        index,
                    }));
                }
            }
        }
    }

    *state = std::mem::take(state).with_last_applied(at);
    effects
}

fn validated_quorum(state: &mut State, quorum: QuorumId) -> &mut QuorumState {
    match state.quorum_mut(quorum) {
        Some(slots) => slots,
        None => unreachable!("validated command names uninitialized quorum {quorum}"),
    }
}

/// Appends `member` at the end of the quorum. Returns its new index.
fn assign_index(slots: &mut QuorumState, member: &MemberId, at: Timestamp) -> u32 {
    let count = slots.count();
    let new_index = count;

    slots.record_count(at, count + 1);
    slots.record_occupant(new_index, at, Occupant::Member(member.clone()));
    slots.set_index(member.clone(), new_index);

    // Postcondition: the new slot and the reverse map agree
    debug_assert!(slots.occupant(new_index).is_some_and(|o| o.is(member)));
    debug_assert_eq!(slots.count(), count + 1);

    new_index
}

/// Removes `member` from the quorum by swap-remove.
///
/// The last slot is vacated; if it belonged to someone other than `member`,
/// that member moves into `member`'s old slot. Returns the moved member and
/// its new index.
fn release_index(
    slots: &mut QuorumState,
    quorum: QuorumId,
    member: &MemberId,
    at: Timestamp,
) -> Option<(MemberId, u32)> {
    let Some(removed_index) = slots.remove_index(member) else {
        unreachable!("validated command removes {member}, absent from quorum {quorum}");
    };

    let count = slots.count();
    // Invariant: a registered member implies a non-empty quorum
    assert!(
        count > removed_index,
        "quorum {quorum} has count {count} but {member} holds index {removed_index}"
    );

    let new_count = count - 1;
    slots.record_count(at, new_count);

    // The last slot is index `new_count`; it is always occupied.
    let last_member = slots
        .occupant(new_count)
        .and_then(Occupant::member)
        .cloned();
    assert!(
        last_member.is_some(),
        "quorum {quorum} last slot {new_count} is vacant below count {count}"
    );

    slots.record_occupant(new_count, at, Occupant::Vacant);

    let moved = match last_member {
        Some(last) if last != *member => {
            slots.record_occupant(removed_index, at, Occupant::Member(last.clone()));
            slots.set_index(last.clone(), removed_index);
            Some((last, removed_index))
        }
        _ => None,
    };

    // Postcondition: member is gone and the tail slot is free
    debug_assert!(slots.index_of(member).is_none());
    debug_assert!(slots.occupant(new_count).is_some_and(Occupant::is_vacant));

    moved
}

/// Errors that can occur when applying commands to the kernel.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("quorum {0} is not initialized")]
    QuorumNotInitialized(QuorumId),

    #[error("quorum {0} is already initialized")]
    QuorumAlreadyInitialized(QuorumId),

    #[error("member {member} is not registered in quorum {quorum}")]
    MemberNotRegistered { quorum: QuorumId, member: MemberId },

    #[error("member {member} is already registered in quorum {quorum} at index {index}")]
    MemberAlreadyRegistered {
        quorum: QuorumId,
        member: MemberId,
        index: u32,
    },

    #[error("quorum {quorum} is full ({max} members)")]
    QuorumFull { quorum: QuorumId, max: u32 },

    #[error(transparent)]
    ClockRegression(#[from] ClockRegression),
}

impl KernelError {
    /// Returns true for errors that indicate a broken time source rather
    /// than a bad request.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, KernelError::ClockRegression(_))
    }
}
