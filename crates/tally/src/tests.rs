//! End-to-end tests through the registry handle.

use std::collections::BTreeSet;
use std::thread;

use test_case::test_case;

use crate::*;

type TestRegistry = Registry<ManualClock, MemoryEventSink>;

fn q(id: u8) -> QuorumId {
    QuorumId::new(id)
}

fn m(id: &str) -> MemberId {
    MemberId::new(id)
}

fn coordinator() -> CallerId {
    CallerId::new("coordinator")
}

fn open_with(config: RegistryConfig) -> (TestRegistry, ManualClock, MemoryEventSink) {
    let clock = ManualClock::at(1);
    let sink = MemoryEventSink::new();
    let registry = Registry::open(
        clock.clone(),
        sink.clone(),
        CoordinatorOnly::new("coordinator"),
        config,
    )
    .unwrap();
    (registry, clock, sink)
}

fn open_empty() -> (TestRegistry, ManualClock, MemoryEventSink) {
    open_with(RegistryConfig::new())
}

// ============================================================================
// Walkthrough
// ============================================================================

#[test]
fn walkthrough_register_register_deregister() {
    let (registry, clock, _) = open_empty();
    let caller = coordinator();

    registry.init_quorum(&caller, q(0)).unwrap();

    clock.set(2);
    assert_eq!(
        registry.register_operator(&caller, &m("A"), &[q(0)]).unwrap(),
        vec![1]
    );
    assert_eq!(registry.current_index(q(0), &m("A")).unwrap(), Some(0));

    clock.set(3);
    assert_eq!(
        registry.register_operator(&caller, &m("B"), &[q(0)]).unwrap(),
        vec![2]
    );
    assert_eq!(registry.current_index(q(0), &m("B")).unwrap(), Some(1));

    clock.set(4);
    registry.deregister_operator(&caller, &m("A"), &[q(0)]).unwrap();

    let state = registry.snapshot().unwrap();
    let quorum = state.quorum(q(0)).unwrap();
    assert_eq!(quorum.count(), 1);
    assert_eq!(quorum.index_of(&m("B")), Some(0));
    assert_eq!(quorum.index_of(&m("A")), None);
    assert_eq!(quorum.slot_history(1).unwrap().latest(), Some(&Occupant::Vacant));
}

#[test]
fn register_before_init_fails() {
    let (registry, _, _) = open_empty();
    let err = registry
        .register_operator(&coordinator(), &m("C"), &[q(1)])
        .unwrap_err();
    assert!(matches!(
        err.as_kernel(),
        Some(KernelError::QuorumNotInitialized(id)) if *id == q(1)
    ));
}

#[test]
fn init_twice_fails() {
    let (registry, _, _) = open_empty();
    registry.init_quorum(&coordinator(), q(2)).unwrap();
    let err = registry.init_quorum(&coordinator(), q(2)).unwrap_err();
    assert!(matches!(
        err.as_kernel(),
        Some(KernelError::QuorumAlreadyInitialized(id)) if *id == q(2)
    ));
}

#[test]
fn same_tick_registrations_coalesce() {
    let (registry, clock, _) = open_with(RegistryConfig::new().with_initial_quorums([q(0)]));
    clock.set(5);
    registry.register_operator(&coordinator(), &m("A"), &[q(0)]).unwrap();
    registry.register_operator(&coordinator(), &m("B"), &[q(0)]).unwrap();

    let state = registry.snapshot().unwrap();
    let entries = state.quorum(q(0)).unwrap().count_history().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].timestamp, Timestamp::from_secs(5));
    assert_eq!(entries[1].value, 2);
}

// ============================================================================
// Limits
// ============================================================================

#[test_case(1 ; "one slot")]
#[test_case(3 ; "three slots")]
fn cap_rejects_the_member_past_the_limit(max: u32) {
    let (registry, _, sink) = open_with(
        RegistryConfig::new()
            .with_initial_quorums([q(0), q(1)])
            .with_max_members_per_quorum(max),
    );
    let caller = coordinator();

    for i in 0..max {
        registry
            .register_operator(&caller, &m(&format!("op{i}")), &[q(0)])
            .unwrap();
    }
    let events_before = sink.len();

    // q1 has room but q0 does not; neither changes.
    let err = registry
        .register_operator(&caller, &m("late"), &[q(1), q(0)])
        .unwrap_err();
    assert!(matches!(
        err.as_kernel(),
        Some(KernelError::QuorumFull { quorum, max: limit }) if *quorum == q(0) && *limit == max
    ));
    assert_eq!(registry.member_count(q(1)).unwrap(), Some(0));
    assert_eq!(sink.len(), events_before);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn concurrent_registrations_keep_indices_dense() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let (registry, _, sink) = open_with(RegistryConfig::new().with_initial_quorums([q(0), q(1)]));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = registry.clone();
            thread::spawn(move || {
                let caller = coordinator();
                for i in 0..PER_THREAD {
                    let member = m(&format!("t{t}-{i}"));
                    registry
                        .register_operator(&caller, &member, &[q(0), q(1)])
                        .unwrap();
                    if i % 3 == 0 {
                        registry
                            .deregister_operator(&caller, &member, &[q(0)])
                            .unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let removed = (0..PER_THREAD).filter(|i| i % 3 == 0).count() * THREADS;
    let total = THREADS * PER_THREAD;

    let state = registry.snapshot().unwrap();
    for (quorum, expected) in [(q(0), total - removed), (q(1), total)] {
        let slots = state.quorum(quorum).unwrap();
        assert_eq!(slots.count() as usize, expected);

        let indices: BTreeSet<u32> = slots.index_map().values().copied().collect();
        let dense: BTreeSet<u32> = (0..slots.count()).collect();
        assert_eq!(indices, dense);

        for (member, index) in slots.index_map() {
            assert!(slots.occupant(*index).unwrap().is(member));
        }
    }

    // Every index assignment and every relocation produced one event.
    assert!(sink.len() >= total * 2);
}

#[test]
fn concurrent_duplicate_registration_admits_one() {
    let (registry, _, _) = open_with(RegistryConfig::new().with_initial_quorums([q(0)]));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                registry
                    .register_operator(&coordinator(), &m("A"), &[q(0)])
                    .is_ok()
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(admitted, 1);
    assert_eq!(registry.member_count(q(0)).unwrap(), Some(1));
}
