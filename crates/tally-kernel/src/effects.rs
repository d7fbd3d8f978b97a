//! Effects produced by the kernel.
//!
//! Effects represent side effects that the runtime must execute after
//! a command is applied. The kernel is pure - it produces effects but
//! never executes them directly.

use serde::{Deserialize, Serialize};
use tally_types::{QuorumId, QuorumIndexUpdate, Timestamp};

/// An effect to be executed by the runtime.
///
/// Effects are produced by [`super::kernel::apply_committed`] in the order
/// their per-quorum updates happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// A quorum became usable.
    QuorumInitialized { quorum: QuorumId, at: Timestamp },

    /// Publish an index assignment to the event sink.
    EmitIndexUpdate(QuorumIndexUpdate),
}
