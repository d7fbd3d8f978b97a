//! The registry handle.
//!
//! [`Registry`] owns the kernel state behind a lock and is the only way
//! commands reach the kernel. Every mutation runs as one critical section:
//! stamp the command with the clock, let the kernel validate and apply it in
//! place, then deliver effects. A rejected command leaves the state, the
//! command log and the event sink untouched.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_kernel::{
    Clock, Command, EventSink, Limits, Runtime, State, SystemClock, TracingEventSink,
    apply_in_place,
};
use tally_types::{CallerId, MemberId, Occupant, QuorumId, RegistryId, Timestamp};
use tracing::{debug, error, info, warn};

use crate::auth::Authorizer;
use crate::error::{Result, TallyError};

/// Configuration for opening a registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Bounds enforced by the kernel.
    pub limits: Limits,
    /// Quorums initialized when the registry is opened.
    pub initial_quorums: Vec<QuorumId>,
}

impl RegistryConfig {
    /// Creates a configuration with no quorums and no membership cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of members per quorum.
    pub fn with_max_members_per_quorum(mut self, max: u32) -> Self {
        self.limits = self.limits.with_max_members_per_quorum(max);
        self
    }

    /// Sets the quorums initialized on open.
    pub fn with_initial_quorums(mut self, quorums: impl IntoIterator<Item = QuorumId>) -> Self {
        self.initial_quorums = quorums.into_iter().collect();
        self
    }
}

/// State shared by all clones of a [`Registry`].
struct RegistryInner<C: Clock, S: EventSink> {
    state: State,
    runtime: Runtime<C, S>,
    /// Every committed command, in order. Replaying it from an empty state
    /// with the same limits reproduces `state`.
    log: Vec<Command>,
}

impl<C: Clock, S: EventSink> RegistryInner<C, S> {
    /// Applies a command and executes its effects.
    ///
    /// This is the only write path: command → kernel → commit → effects.
    fn submit(&mut self, command: Command) -> Result<()> {
        let kind = command.kind();
        let at = command.timestamp();

        match apply_in_place(&mut self.state, command.clone()) {
            Ok(effects) => {
                self.log.push(command);
                debug!(kind, %at, effects = effects.len(), "command committed");
                self.runtime.execute_effects(effects);
                Ok(())
            }
            Err(e) if e.is_invariant_violation() => {
                error!(kind, %at, error = %e, "time source invariant violated");
                Err(e.into())
            }
            Err(e) => {
                warn!(kind, %at, error = %e, "command rejected");
                Err(e.into())
            }
        }
    }
}

/// Handle to a quorum index registry.
///
/// Cheap to clone; clones share the same state. Mutations require a caller
/// admitted by the registry's [`Authorizer`].
///
/// # Example
///
/// ```
/// use tally::{AllowAll, CallerId, MemberId, QuorumId, Registry, RegistryConfig};
/// use tally::{ManualClock, MemoryEventSink};
///
/// let sink = MemoryEventSink::new();
/// let registry = Registry::open(
///     ManualClock::at(100),
///     sink.clone(),
///     AllowAll,
///     RegistryConfig::new().with_initial_quorums([QuorumId::new(0)]),
/// )
/// .unwrap();
///
/// let caller = CallerId::new("coordinator");
/// let counts = registry
///     .register_operator(&caller, &MemberId::new("alice"), &[QuorumId::new(0)])
///     .unwrap();
///
/// assert_eq!(counts, vec![1]);
/// assert_eq!(sink.len(), 1);
/// ```
pub struct Registry<C: Clock, S: EventSink> {
    id: RegistryId,
    inner: Arc<RwLock<RegistryInner<C, S>>>,
    authorizer: Arc<dyn Authorizer>,
}

impl<C: Clock, S: EventSink> Clone for Registry<C, S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
            authorizer: Arc::clone(&self.authorizer),
        }
    }
}

impl Registry<SystemClock, TracingEventSink> {
    /// Opens a registry on the system clock that reports index updates
    /// through `tracing`.
    pub fn open_with_system_clock(
        authorizer: impl Authorizer + 'static,
        config: RegistryConfig,
    ) -> Result<Self> {
        Self::open(SystemClock::new(), TracingEventSink, authorizer, config)
    }
}

impl<C: Clock, S: EventSink> Registry<C, S> {
    /// Opens a registry and initializes the configured quorums.
    ///
    /// Initial quorums are provisioned by the process itself and bypass the
    /// authorizer.
    pub fn open(
        clock: C,
        sink: S,
        authorizer: impl Authorizer + 'static,
        config: RegistryConfig,
    ) -> Result<Self> {
        let mut inner = RegistryInner {
            state: State::with_limits(config.limits),
            runtime: Runtime::new(clock, sink),
            log: Vec::new(),
        };

        for quorum in &config.initial_quorums {
            let at = inner.runtime.now();
            inner.submit(Command::init_quorum(*quorum, at))?;
        }

        let id = RegistryId::generate();
        info!(
            registry = %id,
            quorums = config.initial_quorums.len(),
            max_members = ?config.limits.max_members_per_quorum,
            "registry opened"
        );

        Ok(Self {
            id,
            inner: Arc::new(RwLock::new(inner)),
            authorizer: Arc::new(authorizer),
        })
    }

    /// Returns the opaque identity of this registry.
    pub fn registry_id(&self) -> RegistryId {
        self.id
    }

    /// Returns true once any quorum has been initialized.
    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.read()?.state.is_initialized())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Starts tracking `quorum`. Its count history begins at zero, now.
    pub fn init_quorum(&self, caller: &CallerId, quorum: QuorumId) -> Result<()> {
        self.authorize(caller)?;

        let mut inner = self.write()?;
        let at = inner.runtime.now();
        inner.submit(Command::init_quorum(quorum, at))?;

        info!(%quorum, %at, "quorum initialized");
        Ok(())
    }

    /// Assigns `member` the next free index in each of `quorums`.
    ///
    /// Returns the new member count of each quorum, in the order given.
    /// Fails without any effect if any quorum is uninitialized, already
    /// holds `member`, or is full.
    pub fn register_operator(
        &self,
        caller: &CallerId,
        member: &MemberId,
        quorums: &[QuorumId],
    ) -> Result<Vec<u32>> {
        self.authorize(caller)?;

        let mut inner = self.write()?;
        let at = inner.runtime.now();
        inner.submit(Command::register_operator(
            member.clone(),
            quorums.to_vec(),
            at,
        ))?;

        // Each quorum appears once in a successful registration, so its
        // current count is the count this registration produced.
        let counts = quorums
            .iter()
            .map(|q| {
                inner.state.member_count(*q).ok_or_else(|| {
                    TallyError::internal(format!("quorum {q} vanished after registration"))
                })
            })
            .collect::<Result<Vec<u32>>>()?;

        info!(%member, ?quorums, ?counts, %at, "operator registered");
        Ok(counts)
    }

    /// Releases `member`'s index in each of `quorums`.
    ///
    /// The last member of each quorum moves into the freed slot. Fails
    /// without any effect if any quorum is uninitialized or does not hold
    /// `member`.
    pub fn deregister_operator(
        &self,
        caller: &CallerId,
        member: &MemberId,
        quorums: &[QuorumId],
    ) -> Result<()> {
        self.authorize(caller)?;

        let mut inner = self.write()?;
        let at = inner.runtime.now();
        inner.submit(Command::deregister_operator(
            member.clone(),
            quorums.to_vec(),
            at,
        ))?;

        info!(%member, ?quorums, %at, "operator deregistered");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns the current member count of `quorum`.
    pub fn member_count(&self, quorum: QuorumId) -> Result<Option<u32>> {
        Ok(self.read()?.state.member_count(quorum))
    }

    /// Returns the current index of `member` in `quorum`.
    pub fn current_index(&self, quorum: QuorumId, member: &MemberId) -> Result<Option<u32>> {
        Ok(self.read()?.state.current_index(quorum, member))
    }

    /// Returns the current members of `quorum`, ordered by index.
    pub fn members(&self, quorum: QuorumId) -> Result<Option<Vec<MemberId>>> {
        Ok(self.read()?.state.current_members(quorum))
    }

    /// Returns the member count of `quorum` at `at`.
    pub fn count_at(&self, quorum: QuorumId, at: Timestamp) -> Result<Option<u32>> {
        Ok(self.read()?.state.count_at(quorum, at))
    }

    /// Returns who held `index` in `quorum` at `at`.
    pub fn occupant_at(
        &self,
        quorum: QuorumId,
        index: u32,
        at: Timestamp,
    ) -> Result<Option<Occupant>> {
        Ok(self.read()?.state.occupant_at(quorum, index, at).cloned())
    }

    /// Returns the members of `quorum` at `at`, ordered by index.
    pub fn members_at(&self, quorum: QuorumId, at: Timestamp) -> Result<Option<Vec<MemberId>>> {
        Ok(self.read()?.state.members_at(quorum, at))
    }

    /// Returns a copy of the full kernel state.
    pub fn snapshot(&self) -> Result<State> {
        Ok(self.read()?.state.clone())
    }

    /// Returns every committed command, oldest first.
    pub fn command_log(&self) -> Result<Vec<Command>> {
        Ok(self.read()?.log.clone())
    }

    /// Returns the BLAKE3 digest of the current state.
    pub fn state_hash(&self) -> Result<[u8; 32]> {
        Ok(self.read()?.state.compute_state_hash())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn authorize(&self, caller: &CallerId) -> Result<()> {
        if self.authorizer.authorize(caller) {
            Ok(())
        } else {
            Err(TallyError::Unauthorized(caller.clone()))
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryInner<C, S>>> {
        self.inner
            .read()
            .map_err(|_| TallyError::internal("lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryInner<C, S>>> {
        self.inner
            .write()
            .map_err(|_| TallyError::internal("lock poisoned"))
    }
}
