use std::collections::HashSet;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use swimfd::swim::{Membership, Message, ProcessId};

fn process_id() -> impl Strategy<Value = ProcessId> {
    "[a-z0-9.:-]{1,32}".prop_map(ProcessId::from)
}

fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        process_id().prop_map(Message::ping),
        process_id().prop_map(Message::ack),
        (process_id(), process_id()).prop_map(|(s, t)| Message::relayed_ack(s, t)),
        (process_id(), process_id()).prop_map(|(s, t)| Message::ping_req(s, t)),
        process_id().prop_map(Message::join),
        (process_id(), process_id()).prop_map(|(s, f)| Message::fail(s, f)),
    ]
}

proptest! {
    #[test]
    fn test_codec_round_trip_property(msg in message()) {
        let data = msg.encode().unwrap();
        prop_assert_eq!(Message::decode(&data).unwrap(), msg);
    }

    #[test]
    fn test_decode_never_panics_property(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = Message::decode(&data);
    }

    #[test]
    fn test_target_never_self_property(
        peers in proptest::collection::vec(process_id(), 0..12),
        seed in any::<u64>(),
    ) {
        let self_id = ProcessId::from("self");
        let members = Membership::new(self_id.clone(), peers.clone(), StdRng::seed_from_u64(seed));
        let others: HashSet<ProcessId> = peers.into_iter().filter(|p| *p != self_id).collect();

        for _ in 0..8 {
            match members.get_random_target(&[]) {
                Some(target) => {
                    prop_assert_ne!(&target, &self_id);
                    prop_assert!(others.contains(&target));
                }
                None => prop_assert!(others.is_empty()),
            }
        }
    }

    #[test]
    fn test_helpers_exclude_self_and_target_property(
        peers in proptest::collection::vec(process_id(), 1..12),
        k in 0usize..6,
        seed in any::<u64>(),
    ) {
        let self_id = ProcessId::from("self");
        let target = peers[0].clone();
        let members = Membership::new(self_id.clone(), peers.clone(), StdRng::seed_from_u64(seed));

        let helpers = members.sample_helpers(k, &[&target]);
        let unique: HashSet<&ProcessId> = helpers.iter().collect();
        let candidates = peers
            .iter()
            .filter(|p| **p != self_id && **p != target)
            .collect::<HashSet<_>>()
            .len();

        prop_assert_eq!(unique.len(), helpers.len());
        prop_assert_eq!(helpers.len(), k.min(candidates));
        prop_assert!(!unique.contains(&self_id));
        prop_assert!(!unique.contains(&target));
    }
}
