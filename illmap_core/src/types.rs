//! Data structures for the integer map

use crate::arena::Arena;
use crate::constants::*;
use std::fmt;

/// Offset type: byte offset from the arena base, always 32 bits.
pub type Offset = u32; // <= MAX_ARENA_BYTES

/// Index of a 64-bit lane (byte offset / 8).
pub type Lane = u32;

/// One 64-byte slab, aligned to a cache line.
///
/// Viewed as sixteen 32-bit slot words or as eight 64-bit lanes.
#[repr(C, align(64))]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub words: [u32; SLOTS_PER_NODE],
}

impl Node {
    pub const ZERO: Node = Node {
        words: [0; SLOTS_PER_NODE],
    };

    #[inline]
    pub fn lane(&self, i: usize) -> u64 {
        (self.words[2 * i] as u64) | ((self.words[2 * i + 1] as u64) << 32)
    }

    #[inline]
    pub fn set_lane(&mut self, i: usize, v: u64) {
        self.words[2 * i] = v as u32;
        self.words[2 * i + 1] = (v >> 32) as u32;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.words.iter().map(|w| format!("{w:#010x}")))
            .finish()
    }
}

/// Decoded view of a slot word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Empty,
    Child(Offset),
    Boxed(Lane),
    Scalar(u32),
}

/// Location of one slot word inside the arena.
///
/// This is a byte offset, not a reference: it stays meaningful across
/// arena growth, but only until the next structural mutation of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef(pub(crate) Offset);

impl SlotRef {
    #[inline]
    pub(crate) fn new(node: Offset, dirn: usize) -> Self {
        SlotRef(node + (dirn as u32) * 4)
    }

    /// Offset of the node holding this slot.
    #[inline]
    pub fn node(self) -> Offset {
        self.0 & !(NODE_SIZE as u32 - 1)
    }

    /// Slot index (0..16) within its node.
    #[inline]
    pub fn index(self) -> usize {
        ((self.0 as usize) & (NODE_SIZE - 1)) / 4
    }

    #[inline]
    pub fn offset(self) -> Offset {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The arena would outgrow what a slot can address.
    CapacityExceeded,
    /// The host allocator refused the backing block.
    AllocFailed,
    /// A structural invariant does not hold; the arena cannot be trusted.
    Corrupted(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded => write!(
                f,
                "arena would exceed the maximum addressable size of {MAX_ARENA_BYTES} bytes"
            ),
            Error::AllocFailed => f.write_str("backing memory allocation failed"),
            Error::Corrupted(what) => write!(f, "corrupted arena: {what}"),
        }
    }
}

impl std::error::Error for Error {}

/// The map handle (owns the whole arena).
#[derive(Default)]
pub struct IntMap {
    pub(crate) arena: Option<Arena>, // created on first insert
    pub(crate) len: usize,           // live entries
}

/// Point-in-time arena accounting, see [`IntMap::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapStats {
    pub entries: usize,
    pub arena_bytes: usize,
    pub mark_bytes: usize,
    pub tree_nodes: usize,
    pub free_nodes: usize,
    pub value_blocks: usize,
    pub free_lanes: usize,
    pub grows: u32,
}
