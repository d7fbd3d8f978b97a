//! # tally-kernel: Functional core of `Tally`
//!
//! The kernel is the pure, deterministic heart of the registry. It receives
//! committed commands and produces state changes plus effects to execute.
//!
//! ## Key Principles
//!
//! - **No IO**: The kernel never touches disk, network, or any external resource
//! - **No clocks**: Timestamps are added by the runtime, not the kernel
//! - **Pure functions**: `apply_committed(state, command) -> (state, effects)`
//! - **All or nothing**: A command is validated before its first write, so a
//!   failing command leaves no partial state behind
//!
//! ## Architecture
//!
//! - [`checkpoint`]: The coalescing [`CheckpointLog`] every history is built on
//! - [`command`]: Commands that can be submitted (`InitQuorum`, `RegisterOperator`, ...)
//! - [`effects`]: Effects for the runtime to execute (`EmitIndexUpdate`)
//! - [`state`]: Per-quorum count history, slot histories and index map
//! - [`kernel`]: The `apply_committed` function that ties it all together
//! - [`runtime`]: Executes effects against a [`Clock`] and an [`EventSink`]

pub mod checkpoint;
pub mod command;
pub mod effects;
pub mod kernel;
pub mod runtime;
pub mod state;
pub mod state_hash;
pub mod traits;


// Re-export commonly used items
pub use checkpoint::{CheckpointEntry, CheckpointLog, ClockRegression};
pub use command::Command;
pub use effects::Effect;
pub use kernel::{KernelError, apply_committed, apply_committed_batch, apply_in_place, validate};
pub use runtime::{ManualClock, MemoryEventSink, Runtime, SystemClock, TracingEventSink};
pub use state::{Limits, QuorumState, State};
pub use traits::{Clock, EventSink};
