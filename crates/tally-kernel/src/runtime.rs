//! Runtime layer that executes kernel effects.
//!
//! The kernel is pure and produces effects. The runtime takes these effects
//! and executes them using concrete implementations of the [`Clock`] and
//! [`EventSink`] traits.
//!
//! ## Example
//!
//! ```
//! use tally_kernel::{Command, ManualClock, MemoryEventSink, Runtime, State, apply_committed};
//! use tally_types::QuorumId;
//!
//! let clock = ManualClock::at(100);
//! let sink = MemoryEventSink::new();
//! let mut runtime = Runtime::new(clock, sink.clone());
//!
//! let q = QuorumId::new(0);
//! let (state, effects) = apply_committed(State::new(), Command::init_quorum(q, runtime.now())).unwrap();
//! runtime.execute_effects(effects);
//!
//! let cmd = Command::register_operator("alice", vec![q], runtime.now());
//! let (_state, effects) = apply_committed(state, cmd).unwrap();
//! runtime.execute_effects(effects);
//!
//! assert_eq!(sink.len(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tally_types::{QuorumIndexUpdate, Timestamp};

use crate::effects::Effect;
use crate::traits::{Clock, EventSink};

/// Runtime that executes kernel effects using pluggable traits.
///
/// Generic over Clock and EventSink to enable both production use and
/// deterministic testing.
pub struct Runtime<C, S>
where
    C: Clock,
    S: EventSink,
{
    /// Clock commands are stamped with.
    pub clock: C,
    /// Destination of index updates.
    pub sink: S,
}

impl<C, S> Runtime<C, S>
where
    C: Clock,
    S: EventSink,
{
    /// Creates a new runtime with the given implementations.
    pub fn new(clock: C, sink: S) -> Self {
        Self { clock, sink }
    }

    /// Reads the clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Executes a single effect.
    pub fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::QuorumInitialized { quorum, at } => {
                tracing::debug!(%quorum, %at, "quorum initialized");
            }
            Effect::EmitIndexUpdate(update) => {
                tracing::debug!(
                    member = %update.member,
                    quorum = %update.quorum,
                    index = update.index,
                    "quorum index update"
                );
                self.sink.emit(update);
            }
        }
    }

    /// Executes all effects in order.
    pub fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }
}

// ============================================================================
// Production Implementations
// ============================================================================

/// Production clock using system time, in whole seconds.
///
/// Never reports a time earlier than one it already reported, even if the
/// system clock is stepped back.
#[derive(Debug, Default)]
pub struct SystemClock {
    high_water: AtomicU64,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let now = Timestamp::now().as_secs();
        let prev = self.high_water.fetch_max(now, Ordering::AcqRel);
        if now < prev {
            tracing::warn!(system = now, last = prev, "system clock moved backwards");
        }
        Timestamp::from_secs(now.max(prev))
    }
}

/// Sink that logs every update through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&mut self, update: QuorumIndexUpdate) {
        tracing::info!(
            member = %update.member,
            quorum = %update.quorum,
            index = update.index,
            "QuorumIndexUpdate"
        );
    }
}

// ============================================================================
// Test and Tooling Implementations
// ============================================================================

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the
/// runtime owns another.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `secs`.
    pub fn at(secs: u64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(secs)),
        }
    }

    /// Sets the current time. Setting it backwards is allowed so tests can
    /// exercise clock regression handling.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

/// Sink that keeps every update in memory.
///
/// Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<QuorumIndexUpdate>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every update received so far, oldest first.
    pub fn events(&self) -> Vec<QuorumIndexUpdate> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every buffered update.
    pub fn drain(&self) -> Vec<QuorumIndexUpdate> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&mut self, update: QuorumIndexUpdate) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update);
    }
}
