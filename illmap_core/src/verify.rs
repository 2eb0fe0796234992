//! Full structural audit of a map's arena.

use crate::constants::*;
use crate::helpers::*;
use crate::types::{Error, IntMap, Offset, SlotKind};
use std::collections::HashSet;

impl IntMap {
    /// Walks every reachable node, both free lists and the value blocks,
    /// and checks that together they account for every slab below the mark.
    ///
    /// Intended for tests and debugging; it is linear in the arena size.
    pub fn check_invariants(&self) -> Result<(), Error> {
        let Some(a) = self.arena.as_ref() else {
            return if self.len == 0 {
                Ok(())
            } else {
                Err(Error::Corrupted("entries counted without an arena"))
            };
        };
        let mark = a.mark();
        if mark as usize % NODE_SIZE != 0 || mark > a.size() || a.size() as usize != a.byte_len() {
            return Err(Error::Corrupted("header mark/size disagree with the block"));
        }
        let in_bounds = |off: Offset| off != 0 && off as usize % NODE_SIZE == 0 && off < mark;

        let mut slabs: HashSet<Offset> = HashSet::new();
        let blocks = a.value_blocks();
        for &blk in &blocks {
            if !in_bounds(blk) || !slabs.insert(blk) {
                return Err(Error::Corrupted("bad value block chain"));
            }
        }
        let block_set: HashSet<Offset> = blocks.iter().copied().collect();
        let lane_ok = |lane: u32| {
            lane as usize % LANES_PER_NODE != 0
                && (lane as u64) * 8 < mark as u64
                && block_set.contains(&(lane * 8 & !(NODE_SIZE as u32 - 1)))
        };

        let mut lanes: HashSet<u32> = HashSet::new();
        let mut entries = 0usize;
        let mut tree_nodes = 0usize;
        // (node, parent position, parent prefix, direction taken in parent)
        let mut stack: Vec<(Offset, u32, u64, usize)> = Vec::with_capacity(PATH_DEPTH * 4);
        match decode(a.hdr(HDR_ROOT)) {
            SlotKind::Child(root) => stack.push((root, ROOT_POS, 0, 0)),
            SlotKind::Empty => {}
            _ => return Err(Error::Corrupted("root slot holds a value")),
        }
        while let Some((off, ppos, ppfx, pdir)) = stack.pop() {
            if !in_bounds(off) || !slabs.insert(off) {
                return Err(Error::Corrupted("child offset out of bounds or shared"));
            }
            tree_nodes += 1;
            let node = a.node(off);
            let pos = node_pos(node);
            let pfx = node_prefix(node);
            if pos >= ppos {
                return Err(Error::Corrupted("branch position does not decrease"));
            }
            if ppos != ROOT_POS && (xpfx(pfx, ppos) != xpfx(ppfx, ppos) || xdir(pfx, ppos) != pdir) {
                return Err(Error::Corrupted("node prefix disagrees with its path"));
            }
            let mut live = 0;
            for (dir, &w) in node.words.iter().enumerate() {
                match decode(w) {
                    SlotKind::Empty => continue,
                    SlotKind::Child(child) => {
                        if pos == 0 {
                            return Err(Error::Corrupted("leaf holds a child"));
                        }
                        stack.push((child, pos, pfx, dir));
                    }
                    SlotKind::Boxed(lane) => {
                        if pos != 0 {
                            return Err(Error::Corrupted("value above leaf level"));
                        }
                        if !lane_ok(lane) || !lanes.insert(lane) {
                            return Err(Error::Corrupted("value lane invalid or shared"));
                        }
                        entries += 1;
                    }
                    SlotKind::Scalar(_) => {
                        if pos != 0 {
                            return Err(Error::Corrupted("value above leaf level"));
                        }
                        entries += 1;
                    }
                }
                live += 1;
            }
            if live == 0 {
                return Err(Error::Corrupted("empty node left in the tree"));
            }
            if pos > 0 && live == 1 {
                return Err(Error::Corrupted("inner node with a single child"));
            }
        }
        if entries != self.len {
            return Err(Error::Corrupted("entry count out of sync"));
        }

        let mut free_nodes = 0usize;
        let mut off = a.hdr(HDR_NFRE);
        while off != 0 {
            if !in_bounds(off) || !slabs.insert(off) {
                return Err(Error::Corrupted("free node is out of bounds or in use"));
            }
            free_nodes += 1;
            off = a.node(off).words[0];
        }

        let mut lane = a.hdr(HDR_VFRE);
        while lane != 0 {
            if !lane_ok(lane) || !lanes.insert(lane) {
                return Err(Error::Corrupted("free lane is invalid or in use"));
            }
            lane = a.lane(lane) as u32;
        }

        if 1 + tree_nodes + free_nodes + blocks.len() != mark as usize / NODE_SIZE {
            return Err(Error::Corrupted("slabs below the mark are unaccounted for"));
        }
        Ok(())
    }
}
