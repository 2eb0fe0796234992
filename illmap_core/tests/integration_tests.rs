use std::collections::HashSet;
use std::ops::ControlFlow;

use illmap_core::{Error, IntMap};

#[test]
fn basic_insert_lookup_delete() {
    let mut map = IntMap::new();
    // initially not found
    assert_eq!(map.get(1000), None);
    map.set(1000, 2000).unwrap();
    assert_eq!(map.get(1000), Some(2000));
    assert!(map.has(1000));
    // delete & re-check
    assert!(map.delete(1000));
    assert_eq!(map.get(1000), None);
    assert!(!map.has(1000));
    assert!(map.is_empty());
    map.check_invariants().unwrap();
    map.destroy();
}

#[test]
fn sequential_keys_round_trip_and_enumerate() {
    let mut map = IntMap::new();
    for k in 1..=10_000u64 {
        map.set(k, k * 2).unwrap();
    }
    assert_eq!(map.len(), 10_000);
    for k in 1..=10_000u64 {
        assert_eq!(map.get(k), Some(k * 2), "key {k}");
    }
    let mut seen = HashSet::new();
    let _ = map.for_each(|k, v| {
        assert_eq!(v, k * 2);
        assert!(seen.insert(k), "key {k} visited twice");
        ControlFlow::Continue(())
    });
    assert_eq!(seen.len(), 10_000);
    assert!(seen.iter().all(|k| (1..=10_000).contains(k)));
    map.check_invariants().unwrap();
}

#[test]
fn overwrite_leaves_the_tree_alone() {
    let mut map = IntMap::new();
    for k in [7u64, 0xdead_beef, 0x1234_5678_9abc_def0] {
        map.set(k, 1).unwrap();
    }
    let before = map.stats();
    let slot = map.lookup(0xdead_beef).unwrap();
    map.set(0xdead_beef, 2).unwrap();
    // an overwrite neither reserves nor allocates
    assert_eq!(map.stats(), before);
    assert_eq!(map.lookup(0xdead_beef), Some(slot));
    assert_eq!(map.get(0xdead_beef), Some(2));
    assert_eq!(map.len(), 3);
}

#[test]
fn deleting_an_absent_key_changes_nothing() {
    let mut map = IntMap::new();
    assert!(!map.delete(5));
    for k in [1u64, 2, 0x100, 0xffff_0000_0000_0000] {
        map.set(k, k).unwrap();
    }
    let entries: Vec<_> = map.iter().collect();
    let stats = map.stats();
    for k in [3u64, 0x101, 0x200, 0xffff_0000_0000_0001, u64::MAX] {
        assert!(!map.delete(k));
    }
    assert_eq!(map.iter().collect::<Vec<_>>(), entries);
    assert_eq!(map.stats(), stats);
}

#[test]
fn growth_keeps_every_entry_reachable() {
    let mut map = IntMap::new();
    let keys: Vec<u64> = (0..5_000).map(|_| rand::random::<u64>()).collect();
    for (i, &k) in keys.iter().enumerate() {
        map.set(k, i as u64).unwrap();
    }
    assert!(map.stats().grows >= 3, "only {} growths", map.stats().grows);
    let distinct: HashSet<u64> = keys.iter().copied().collect();
    assert_eq!(map.len(), distinct.len());
    for &k in &distinct {
        assert!(map.has(k));
    }
    let walked: HashSet<u64> = map.iter().map(|(k, _)| k).collect();
    assert_eq!(walked, distinct);
    map.check_invariants().unwrap();
}

#[test]
fn deletes_collapse_single_child_chains() {
    let base = 0x1234_5678_9abc_def0u64;
    let others = [
        base + 0x1,
        base + 0x10,
        base + 0x100,
        base + 0x1_0000,
        base + 0x100_0000_0000,
        base ^ (0xf << 60),
    ];
    let mut map = IntMap::new();
    map.set(base, 1).unwrap();
    for &k in &others {
        map.set(k, 2).unwrap();
    }
    assert!(map.stats().tree_nodes > 1);
    map.check_invariants().unwrap();

    for &k in &others {
        assert!(map.delete(k));
        map.check_invariants().unwrap();
    }
    let s = map.stats();
    assert_eq!(s.tree_nodes, 1);
    assert_eq!(s.entries, 1);
    assert_eq!(map.get(base), Some(1));
}

#[test]
fn emptied_tree_recycles_its_nodes() {
    let mut map = IntMap::new();
    let keys: Vec<u64> = (0..200u64).map(|i| i.wrapping_mul(0x9e37_79b9_7f4a_7c15)).collect();
    for &k in &keys {
        map.set(k, k).unwrap();
    }
    let mark = map.stats().mark_bytes;
    for &k in &keys {
        assert!(map.delete(k));
    }
    let s = map.stats();
    assert_eq!(s.tree_nodes, 0);
    assert!(s.free_nodes > 0);
    assert!(map.iter().next().is_none());
    map.check_invariants().unwrap();

    for &k in &keys {
        map.set(k, !k).unwrap();
    }
    assert_eq!(map.stats().mark_bytes, mark);
    for &k in &keys {
        assert_eq!(map.get(k), Some(!k));
    }
}

#[test]
fn extreme_keys_and_values() {
    let mut map = IntMap::new();
    let keys = [0u64, 1, 0xf, 0x10, 1 << 63, u64::MAX, u64::MAX - 1, u64::MAX >> 4];
    for &k in &keys {
        map.set(k, u64::MAX ^ k).unwrap();
    }
    for &k in &keys {
        assert_eq!(map.get(k), Some(u64::MAX ^ k));
    }
    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    assert_eq!(map.iter().map(|(k, _)| k).collect::<Vec<_>>(), sorted);
    map.check_invariants().unwrap();
}

#[test]
fn for_each_stops_on_break() {
    let mut map = IntMap::new();
    for k in 0..100u64 {
        map.set(k, k).unwrap();
    }
    let mut visited = 0;
    let flow = map.for_each(|_, _| {
        visited += 1;
        if visited == 10 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(flow, ControlFlow::Break(()));
    assert_eq!(visited, 10);
}

#[test]
fn clear_keeps_the_block() {
    let mut map = IntMap::with_capacity(1024).unwrap();
    let bytes = map.stats().arena_bytes;
    for k in 0..500u64 {
        map.set(k << 8, k).unwrap();
    }
    map.clear();
    assert!(map.is_empty());
    assert_eq!(map.get(0), None);
    assert_eq!(map.stats().arena_bytes, bytes);
    map.check_invariants().unwrap();
    map.set(42, 43).unwrap();
    assert_eq!(map.get(42), Some(43));
}

#[test]
fn capacity_is_bounded_by_the_offset_range() {
    assert_eq!(IntMap::with_capacity(usize::MAX).err(), Some(Error::CapacityExceeded));
    let mut map = IntMap::with_capacity(0).unwrap();
    assert_eq!(map.stats().arena_bytes, 0);
    assert_eq!(map.reserve(usize::MAX), Err(Error::CapacityExceeded));
    map.set(1, 1).unwrap();
    assert_eq!(map.reserve(1 << 30), Err(Error::CapacityExceeded));
    // a failed reservation leaves the map intact
    assert_eq!(map.get(1), Some(1));
    map.check_invariants().unwrap();
}

#[test]
fn engine_slots_are_stable_per_key() {
    let mut map = IntMap::new();
    let s1 = map.assign(0xabc).unwrap();
    assert_eq!(map.get_value(s1), None);
    assert_eq!(map.lookup(0xabc), None);
    map.set_value(s1, 99).unwrap();
    map.check_invariants().unwrap();
    assert_eq!(map.lookup(0xabc), Some(s1));
    assert_eq!(map.assign(0xabc).unwrap(), s1);
    assert_eq!(map.get_value(s1), Some(99));
    assert_eq!(map.len(), 1);
    assert!(map.remove(0xabc));
    assert!(!map.remove(0xabc));
    assert_eq!(map.len(), 0);
}

#[test]
fn del_value_releases_the_box_and_folds_the_path() {
    let mut map = IntMap::new();
    map.set(0x10, 1).unwrap();
    map.set(0x11, 2).unwrap();
    let lanes = map.stats().free_lanes;
    let slot = map.lookup(0x11).unwrap();
    assert_eq!(map.del_value(slot), Some(2));
    assert_eq!(map.del_value(slot), None);
    assert_eq!(map.get(0x11), None);
    assert_eq!(map.get(0x10), Some(1));
    assert_eq!(map.len(), 1);
    assert_eq!(map.stats().free_lanes, lanes + 1);
    map.check_invariants().unwrap();

    // the leaf still holds 0x10, so the slot comes back in place
    map.set(0x11, 3).unwrap();
    assert_eq!(map.lookup(0x11), Some(slot));
    assert_eq!(map.get(0x11), Some(3));

    // emptying the leaf through del_value frees it like delete does
    for key in [0x10, 0x11] {
        let slot = map.lookup(key).unwrap();
        assert!(map.del_value(slot).is_some());
        map.check_invariants().unwrap();
    }
    assert!(map.is_empty());
    assert_eq!(map.stats().tree_nodes, 0);
}

#[test]
fn set_many_and_debug() {
    let mut map = IntMap::new();
    map.set_many(&[(3, 30), (1, 10), (2, 20)]).unwrap();
    assert_eq!(format!("{map:?}"), "{1: 10, 2: 20, 3: 30}");
    let total: u64 = (&map).into_iter().map(|(_, v)| v).sum();
    assert_eq!(total, 60);
}
