//! Deterministic state hashing for kernel state.
//!
//! The hash covers every history entry, so two registries with the same
//! current assignment but different pasts hash differently. Replaying the
//! same command log always reproduces the same hash, which lets an observer
//! check a reconstructed registry against a published digest.
//!
//! # Algorithm
//!
//! BLAKE3 over, in order:
//! - limits and last applied timestamp
//! - all quorums (sorted by `QuorumId`), each with its count history, its
//!   slot histories (by index) and its index map (sorted by member)
//!
//! Lengths are hashed before every variable-length field so adjacent fields
//! cannot run into each other.

use blake3::Hasher;
use tally_types::{Occupant, Timestamp};

use crate::checkpoint::CheckpointLog;
use crate::state::State;

impl State {
    /// Computes a deterministic hash of the entire kernel state.
    ///
    /// # Examples
    ///
    /// ```
    /// use tally_kernel::State;
    ///
    /// let state1 = State::new();
    /// let state2 = State::new();
    ///
    /// // Same state → same hash
    /// assert_eq!(state1.compute_state_hash(), state2.compute_state_hash());
    /// ```
    pub fn compute_state_hash(&self) -> [u8; 32] {
        let mut hasher = Hasher::new();

        match self.limits().max_members_per_quorum {
            Some(max) => {
                hasher.update(&[1u8]);
                hasher.update(&max.to_le_bytes());
            }
            None => {
                hasher.update(&[0u8]);
            }
        }
        hash_timestamp(&mut hasher, self.last_applied().unwrap_or_default());

        hasher.update(&(self.quorum_count() as u64).to_le_bytes());
        for (quorum, slots) in self.quorums() {
            hasher.update(&[quorum.as_u8()]);

            hash_log(&mut hasher, slots.count_history(), |h, count| {
                h.update(&count.to_le_bytes());
            });

            hasher.update(&(slots.slot_histories().len() as u64).to_le_bytes());
            for log in slots.slot_histories() {
                hash_log(&mut hasher, log, hash_occupant);
            }

            hasher.update(&(slots.index_map().len() as u64).to_le_bytes());
            for (member, index) in slots.index_map() {
                hash_str(&mut hasher, member.as_str());
                hasher.update(&index.to_le_bytes());
            }
        }

        *hasher.finalize().as_bytes()
    }
}

fn hash_log<V>(
    hasher: &mut Hasher,
    log: &CheckpointLog<V>,
    hash_value: impl Fn(&mut Hasher, &V),
) {
    hasher.update(&(log.len() as u64).to_le_bytes());
    for entry in log.entries() {
        hash_timestamp(hasher, entry.timestamp);
        hash_value(hasher, &entry.value);
    }
}

fn hash_occupant(hasher: &mut Hasher, occupant: &Occupant) {
    match occupant {
        Occupant::Vacant => {
            hasher.update(&[0u8]);
        }
        Occupant::Member(member) => {
            hasher.update(&[1u8]);
            hash_str(hasher, member.as_str());
        }
    }
}

fn hash_timestamp(hasher: &mut Hasher, ts: Timestamp) {
    hasher.update(&ts.as_secs().to_le_bytes());
}

fn hash_str(hasher: &mut Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
