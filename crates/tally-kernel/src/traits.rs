//! Seams between the pure kernel and the outside world.
//!
//! The runtime is generic over these traits so production code and tests
//! drive the same kernel with different clocks and sinks.

use tally_types::{QuorumIndexUpdate, Timestamp};

/// Source of the timestamps commands are stamped with.
///
/// Must be monotonic non-decreasing. The kernel rejects a command stamped
/// before the previous one.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Receiver of index assignment notifications.
///
/// Delivery is fire-and-forget from the registry's point of view: a sink
/// that needs durability or retries must provide them itself.
pub trait EventSink {
    fn emit(&mut self, update: QuorumIndexUpdate);
}
