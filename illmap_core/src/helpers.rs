//! Slot codec and key nibble arithmetic
//!
//! A slot word is `[ payload:26 | scalar:1 | node:1 | pmask:4 ]`. The low
//! nibble of each of a node's sixteen slots holds one nibble of that node's
//! prefix, so the node stores a full 64-bit prefix without a separate field.
//! Nibble 0 of that prefix is the node's branch position; a node at position
//! `p` keeps only key nibbles above `p`, so nibble 0 is always free for it.

use crate::constants::*;
use crate::types::{Lane, Node, Offset, SlotKind};

#[inline(always)]
pub const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Nibble of `key` a node at branch position `pos` discriminates on.
#[inline(always)]
pub fn xdir(key: u64, pos: u32) -> usize {
    ((key >> (pos << 2)) & 0xf) as usize
}

/// Position of the most significant non-zero nibble (0 for 0).
#[inline(always)]
pub fn xpos(x: u64) -> u32 {
    (63 - (x | 1).leading_zeros()) >> 2
}

/// Highest nibble position at which two keys differ.
#[inline]
pub fn diff_pos(a: u64, b: u64) -> u32 {
    xpos(a ^ b)
}

/// `key` with nibbles `0..=pos` cleared.
#[inline(always)]
pub fn xpfx(key: u64, pos: u32) -> u64 {
    key & (!0xf_u64 << (pos << 2))
}

#[inline(always)]
pub fn node_pos(node: &Node) -> u32 {
    node.words[0] & SLOT_PMASK
}

pub fn node_prefix(node: &Node) -> u64 {
    node.words
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &w)| acc | (((w & SLOT_PMASK) as u64) << (i << 2)))
}

/// Writes `prefix` (whose nibble 0 is the branch position) across the slots.
pub fn set_node_prefix(node: &mut Node, prefix: u64) {
    for (i, w) in node.words.iter_mut().enumerate() {
        *w = (*w & !SLOT_PMASK) | (((prefix >> (i << 2)) as u32) & SLOT_PMASK);
    }
}

#[inline]
pub fn decode(sval: u32) -> SlotKind {
    if sval & SLOT_NODE != 0 {
        SlotKind::Child(sval & SLOT_VALUE)
    } else if sval & SLOT_SCALAR != 0 {
        SlotKind::Scalar(sval >> SLOT_SHIFT)
    } else if sval & SLOT_VALUE != 0 {
        SlotKind::Boxed(sval >> SLOT_SHIFT)
    } else {
        SlotKind::Empty
    }
}

#[inline(always)]
pub fn is_occupied(sval: u32) -> bool {
    sval & !SLOT_PMASK != 0
}

#[inline(always)]
pub fn is_child(sval: u32) -> bool {
    sval & SLOT_NODE != 0
}

/// Empty slot keeping the prefix nibble of `sval`.
#[inline(always)]
pub fn cleared(sval: u32) -> u32 {
    sval & SLOT_PMASK
}

#[inline(always)]
pub fn child_slot(sval: u32, child: Offset) -> u32 {
    debug_assert!(child as usize % NODE_SIZE == 0 && child != 0);
    cleared(sval) | SLOT_NODE | child
}

#[inline(always)]
pub fn boxed_slot(sval: u32, lane: Lane) -> u32 {
    debug_assert!(lane != 0 && lane < (1 << (32 - SLOT_SHIFT)));
    cleared(sval) | (lane << SLOT_SHIFT)
}

/// Moves the reference part of `from` into `into`, keeping `into`'s nibble.
#[inline(always)]
pub fn graft(into: u32, from: u32) -> u32 {
    cleared(into) | (from & !SLOT_PMASK)
}

#[inline]
pub fn scalar_slot(sval: u32, payload: u32) -> u32 {
    debug_assert!(payload < (1 << (32 - SLOT_SHIFT)));
    cleared(sval) | SLOT_SCALAR | (payload << SLOT_SHIFT)
}

#[inline]
pub fn ceil_pow2(n: u64) -> u64 {
    n.max(1).next_power_of_two()
}
