//! Depth-first, nibble-ascending walk over the trie.
//!
//! The walk keeps its own stack of (node, next direction) frames instead of
//! recursing; a path holds at most one node per key nibble. Mutating the map
//! between steps is not supported: restart the cursor instead.

use crate::constants::*;
use crate::helpers::{decode, node_prefix};
use crate::types::{IntMap, Offset, SlotKind, SlotRef};

#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    node: Offset,
    dirn: u32,
}

/// Resumable iteration state for [`IntMap::iterate`].
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    stack: [Frame; MAX_DEPTH],
    sp: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn push(&mut self, node: Offset) {
        debug_assert!(self.sp < MAX_DEPTH, "trie deeper than a key has nibbles");
        self.stack[self.sp] = Frame { node, dirn: 0 };
        self.sp += 1;
    }
}

impl IntMap {
    /// Next `(key, slot)` pair, or `None` once the walk is exhausted.
    /// `restart` rewinds the cursor to the root first.
    pub fn iterate(&self, cur: &mut Cursor, restart: bool) -> Option<(u64, SlotRef)> {
        if restart {
            cur.sp = 0;
            let arena = self.arena.as_ref()?;
            match decode(arena.hdr(HDR_ROOT)) {
                SlotKind::Child(root) => cur.push(root),
                _ => return None,
            }
        }
        let arena = self.arena.as_ref()?;
        while cur.sp > 0 {
            let top = &mut cur.stack[cur.sp - 1];
            if top.dirn as usize >= SLOTS_PER_NODE {
                cur.sp -= 1;
                continue;
            }
            let node = top.node;
            let dirn = top.dirn as usize;
            top.dirn += 1;

            let slot = SlotRef::new(node, dirn);
            match decode(arena.slot(slot)) {
                SlotKind::Empty => {}
                SlotKind::Child(child) => cur.push(child),
                SlotKind::Boxed(_) | SlotKind::Scalar(_) => {
                    return Some((node_prefix(arena.node(node)) | dirn as u64, slot));
                }
            }
        }
        None
    }
}

/// Borrowing iterator over `(key, value)` pairs.
pub struct Iter<'a> {
    map: &'a IntMap,
    cursor: Cursor,
    started: bool,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(map: &'a IntMap) -> Self {
        Iter {
            map,
            cursor: Cursor::new(),
            started: false,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<(u64, u64)> {
        let restart = !std::mem::replace(&mut self.started, true);
        let (key, slot) = self.map.iterate(&mut self.cursor, restart)?;
        self.map.get_value(slot).map(|v| (key, v))
    }
}

impl std::iter::FusedIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_yields_nothing() {
        let map = IntMap::new();
        let mut cur = Cursor::new();
        assert!(map.iterate(&mut cur, true).is_none());
        assert!(map.iterate(&mut cur, false).is_none());
        assert_eq!(map.iter().count(), 0);
    }

    #[test]
    fn walk_is_nibble_ascending() {
        let mut map = IntMap::new();
        for k in [0x31u64, 0x12, 0x2f, 0x10, 0x1_0000] {
            map.set(k, k + 1).unwrap();
        }
        let keys: Vec<u64> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0x10, 0x12, 0x2f, 0x31, 0x1_0000]);
    }

    #[test]
    fn restart_rewinds() {
        let mut map = IntMap::new();
        for k in 0..40u64 {
            map.set(k * 17, k).unwrap();
        }
        let mut cur = Cursor::new();
        let first = map.iterate(&mut cur, true).unwrap();
        map.iterate(&mut cur, false).unwrap();
        map.iterate(&mut cur, false).unwrap();
        assert_eq!(map.iterate(&mut cur, true).unwrap(), first);
        let mut n = 1;
        while map.iterate(&mut cur, false).is_some() {
            n += 1;
        }
        assert_eq!(n, 40);
        assert!(map.iterate(&mut cur, false).is_none());
    }
}
