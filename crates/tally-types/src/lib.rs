//! # tally-types: Core types for `Tally`
//!
//! This crate contains shared types used across the `Tally` registry:
//! - Entity IDs ([`QuorumId`], [`MemberId`], [`CallerId`], [`RegistryId`])
//! - Slot occupancy ([`Occupant`])
//! - Temporal types ([`Timestamp`])
//! - Observer notifications ([`QuorumIndexUpdate`])

use std::{
    fmt::{Debug, Display},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs
// ============================================================================

/// Identifier of an independently managed group of members.
///
/// Quorum ids are small: a registry tracks at most 256 quorums.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct QuorumId(u8);

impl QuorumId {
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl Display for QuorumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for QuorumId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<QuorumId> for u8 {
    fn from(id: QuorumId) -> Self {
        id.0
    }
}

/// Opaque identifier of a registry participant (an operator).
///
/// Member ids are compared and hashed by their string contents. They carry
/// no structure the registry relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MemberId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of whoever submits a command to the registry.
///
/// Only consulted by the authorization gate; the kernel never sees it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Length of a [`RegistryId`] in bytes.
pub const REGISTRY_ID_LENGTH: usize = 16;

/// Opaque identity of a registry instance.
///
/// Observers use it to tell apart histories produced by different
/// registries. It is random, never derived from state.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistryId([u8; REGISTRY_ID_LENGTH]);

impl RegistryId {
    /// Creates a registry id from raw bytes.
    pub fn from_bytes(bytes: [u8; REGISTRY_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the id as a byte slice.
    pub fn as_bytes(&self) -> &[u8; REGISTRY_ID_LENGTH] {
        &self.0
    }

    /// Generates a new random registry id using the OS CSPRNG.
    ///
    /// # Panics
    ///
    /// Panics if the OS CSPRNG fails, which indicates a catastrophic
    /// system error (e.g., no entropy source available).
    pub fn generate() -> Self {
        let mut bytes = [0u8; REGISTRY_ID_LENGTH];
        getrandom::fill(&mut bytes).expect("CSPRNG failure is catastrophic");
        Self(bytes)
    }
}

impl Debug for RegistryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegistryId({self})")
    }
}

impl Display for RegistryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; REGISTRY_ID_LENGTH]> for RegistryId {
    fn from(bytes: [u8; REGISTRY_ID_LENGTH]) -> Self {
        Self::from_bytes(bytes)
    }
}

// ============================================================================
// Slot Occupancy
// ============================================================================

/// Who holds an index slot at some point in time.
///
/// `Vacant` is the sentinel for an unoccupied slot. Being a separate variant
/// it can never collide with a real [`MemberId`], whatever string the member
/// is named with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupant {
    Vacant,
    Member(MemberId),
}

impl Occupant {
    pub fn is_vacant(&self) -> bool {
        matches!(self, Occupant::Vacant)
    }

    /// Returns the occupying member, if any.
    pub fn member(&self) -> Option<&MemberId> {
        match self {
            Occupant::Vacant => None,
            Occupant::Member(id) => Some(id),
        }
    }

    /// Returns true if this slot is held by `member`.
    pub fn is(&self, member: &MemberId) -> bool {
        self.member() == Some(member)
    }
}

impl Display for Occupant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Occupant::Vacant => write!(f, "<vacant>"),
            Occupant::Member(id) => write!(f, "{id}"),
        }
    }
}

impl From<MemberId> for Occupant {
    fn from(id: MemberId) -> Self {
        Occupant::Member(id)
    }
}

// ============================================================================
// Timestamp - Copy (8-byte value, seconds resolution)
// ============================================================================

/// Wall-clock timestamp in whole seconds since the Unix epoch.
///
/// Checkpoints coalesce on equal timestamps, so the resolution here decides
/// how many mutations share a history entry. Seconds match the tick of the
/// time source the registry is driven by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch (1970-01-01 00:00:00 UTC).
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Creates a timestamp from seconds since the Unix epoch.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the timestamp as seconds since the Unix epoch.
    pub fn as_secs(self) -> u64 {
        self.0
    }

    /// Creates a timestamp for the current time.
    ///
    /// A system clock set before the epoch reads as [`Timestamp::EPOCH`].
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(secs)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self(secs)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Notification that `member` now holds `index` in `quorum`.
///
/// Emitted once per registration per quorum, and once per relocation when a
/// deregistration swaps the last member into the vacated slot. Off-chain
/// observers follow membership with these instead of rescanning state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuorumIndexUpdate {
    pub member: MemberId,
    pub quorum: QuorumId,
    pub index: u32,
}

impl Display for QuorumIndexUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "quorum {} index {} -> {}",
            self.quorum, self.index, self.member
        )
    }
}

#[cfg(test)]
mod tests;
