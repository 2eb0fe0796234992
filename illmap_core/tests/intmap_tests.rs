use proptest::collection::vec as pvec;
use proptest::prelude::*;
use std::collections::HashMap;

use illmap_core::IntMap;

#[derive(Debug, Clone)]
enum Op {
    Set(u64, u64),
    Delete(u64),
}

// Keys drawn from a narrow band collide in long prefixes; the full range
// exercises splits near the top nibble.
fn key() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..64,
        (0u64..64).prop_map(|k| 0xfeed_0000_0000_0000 | (k << 20)),
        any::<u64>(),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (key(), any::<u64>()).prop_map(|(k, v)| Op::Set(k, v)),
        2 => key().prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn behaves_like_a_hashmap(ops in pvec(op(), 1..400)) {
        let mut map = IntMap::new();
        let mut model: HashMap<u64, u64> = HashMap::new();
        for op in &ops {
            match *op {
                Op::Set(k, v) => {
                    map.set(k, v).unwrap();
                    model.insert(k, v);
                    prop_assert_eq!(map.get(k), Some(v));
                }
                Op::Delete(k) => {
                    prop_assert_eq!(map.delete(k), model.remove(&k).is_some());
                    prop_assert!(!map.has(k));
                }
            }
        }
        prop_assert_eq!(map.len(), model.len());
        for (&k, &v) in &model {
            prop_assert_eq!(map.get(k), Some(v));
        }
        let walked: HashMap<u64, u64> = map.iter().collect();
        prop_assert_eq!(walked.len(), map.iter().count());
        prop_assert_eq!(walked, model);
        prop_assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn overwrite_keeps_the_last_value(k in key(), v1 in any::<u64>(), v2 in any::<u64>()) {
        let mut map = IntMap::new();
        map.set(k, v1).unwrap();
        let nodes = map.stats().tree_nodes;
        map.set(k, v2).unwrap();
        prop_assert_eq!(map.get(k), Some(v2));
        prop_assert_eq!(map.stats().tree_nodes, nodes);
        prop_assert_eq!(map.len(), 1);
    }

    #[test]
    fn delete_then_get_is_absent(keys in pvec(key(), 1..64)) {
        let mut map = IntMap::new();
        for &k in &keys {
            map.set(k, k ^ 0x5555).unwrap();
        }
        for &k in &keys {
            map.delete(k);
            prop_assert_eq!(map.get(k), None);
        }
        prop_assert!(map.is_empty());
        prop_assert_eq!(map.stats().tree_nodes, 0);
        prop_assert!(map.check_invariants().is_ok());
    }
}
