use test_case::test_case;

use super::*;

#[test]
fn vacant_never_matches_a_member() {
    let vacant = Occupant::Vacant;
    assert!(vacant.is_vacant());
    assert_eq!(vacant.member(), None);
    assert!(!vacant.is(&MemberId::new("")));
    assert!(!vacant.is(&MemberId::new("<vacant>")));
}

#[test]
fn member_occupant_reports_its_member() {
    let alice = MemberId::new("alice");
    let slot = Occupant::from(alice.clone());

    assert!(!slot.is_vacant());
    assert_eq!(slot.member(), Some(&alice));
    assert!(slot.is(&alice));
    assert!(!slot.is(&MemberId::new("bob")));
}

#[test_case(0, "0s"; "epoch")]
#[test_case(42, "42s"; "small")]
#[test_case(1_700_000_000, "1700000000s"; "recent")]
fn timestamp_display(secs: u64, expected: &str) {
    assert_eq!(Timestamp::from_secs(secs).to_string(), expected);
}

#[test]
fn timestamps_order_by_seconds() {
    assert!(Timestamp::from_secs(1) < Timestamp::from_secs(2));
    assert_eq!(Timestamp::default(), Timestamp::EPOCH);
    assert_eq!(u64::from(Timestamp::from(7u64)), 7);
}

#[test]
fn now_is_after_epoch() {
    assert!(Timestamp::now() > Timestamp::EPOCH);
}

#[test]
fn registry_id_displays_as_hex() {
    let id = RegistryId::from_bytes([0xab; REGISTRY_ID_LENGTH]);
    assert_eq!(id.to_string(), "ab".repeat(REGISTRY_ID_LENGTH));
    assert_eq!(format!("{id:?}"), format!("RegistryId({id})"));
}

#[test]
fn generated_registry_ids_differ() {
    assert_ne!(RegistryId::generate(), RegistryId::generate());
}

#[test]
fn quorum_id_round_trips_through_u8() {
    let q = QuorumId::from(3u8);
    assert_eq!(u8::from(q), 3);
    assert_eq!(q.as_u8(), 3);
    assert_eq!(q.to_string(), "3");
}

#[test]
fn index_update_serializes_with_field_names() {
    let update = QuorumIndexUpdate {
        member: MemberId::new("alice"),
        quorum: QuorumId::new(1),
        index: 4,
    };

    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["member"], "alice");
    assert_eq!(json["quorum"], 1);
    assert_eq!(json["index"], 4);
    assert_eq!(update.to_string(), "quorum 1 index 4 -> alice");
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn member_ids_compare_like_strings(a in ".{0,12}", b in ".{0,12}") {
            let ma = MemberId::new(a.clone());
            let mb = MemberId::new(b.clone());
            prop_assert_eq!(ma == mb, a == b);
            prop_assert_eq!(ma.cmp(&mb), a.cmp(&b));
        }
    }
}
