//! # Tally
//!
//! A checkpointed quorum index registry.
//!
//! Tally assigns every operator of a quorum a dense index in `[0, count)`
//! and records every change to the count and to every slot with the time it
//! happened. Any past assignment can be queried exactly. Removing an
//! operator keeps indices dense by moving the highest-indexed operator into
//! the freed slot.
//!
//! # Quick Start
//!
//! ```
//! use tally::{CallerId, CoordinatorOnly, MemberId, QuorumId, Registry, RegistryConfig};
//! use tally::{ManualClock, MemoryEventSink, Timestamp};
//!
//! let clock = ManualClock::at(10);
//! let registry = Registry::open(
//!     clock.clone(),
//!     MemoryEventSink::new(),
//!     CoordinatorOnly::new("coordinator"),
//!     RegistryConfig::new().with_initial_quorums([QuorumId::new(0)]),
//! )
//! .unwrap();
//!
//! let caller = CallerId::new("coordinator");
//! let q = QuorumId::new(0);
//!
//! clock.set(20);
//! registry.register_operator(&caller, &MemberId::new("A"), &[q]).unwrap();
//! registry.register_operator(&caller, &MemberId::new("B"), &[q]).unwrap();
//!
//! clock.set(30);
//! registry.deregister_operator(&caller, &MemberId::new("A"), &[q]).unwrap();
//!
//! // B moved into slot 0; the past is still visible.
//! assert_eq!(registry.current_index(q, &MemberId::new("B")).unwrap(), Some(0));
//! assert_eq!(registry.count_at(q, Timestamp::from_secs(25)).unwrap(), Some(2));
//! ```
//!
//! # Architecture
//!
//! - **Types** (`tally-types`): identifiers, timestamps, the vacant sentinel
//! - **Kernel** (`tally-kernel`): the pure state machine and its histories
//! - **Registry** (this crate): locking, authorization, effect delivery

mod auth;
mod error;
mod registry;

#[cfg(test)]
mod tests;

pub use auth::{AllowAll, Authorizer, CoordinatorOnly};
pub use error::{Result, TallyError};
pub use registry::{Registry, RegistryConfig};

// Re-export kernel and types for callers that drive the registry directly
pub use tally_kernel::{
    CheckpointEntry, CheckpointLog, Clock, ClockRegression, Command, Effect, EventSink,
    KernelError, Limits, ManualClock, MemoryEventSink, QuorumState, State, SystemClock,
    TracingEventSink, apply_committed, apply_committed_batch, apply_in_place, validate,
};
pub use tally_types::{
    CallerId, MemberId, Occupant, QuorumId, QuorumIndexUpdate, RegistryId, Timestamp,
};
