//! The arena: one growable block of 64-byte nodes addressed by byte offset.
//!
//! Node 0 is the header (root slot, growth mark, size, free-list heads).
//! Nothing outside this module holds anything but offsets into the block,
//! so growth is a plain copy into a bigger block with no fix-up pass.

use crate::constants::*;
use crate::helpers::ceil_pow2;
use crate::types::{Error, Lane, Node, Offset, SlotRef};
use log::{debug, info};

// ===== Compile-time assertions for alignment and size =====
const _: () = assert!(std::mem::size_of::<Node>() == NODE_SIZE);
const _: () = assert!(std::mem::align_of::<Node>() == NODE_SIZE);
const _: () = assert!(MAX_ARENA_BYTES / 8 <= (1u64 << (32 - SLOT_SHIFT)));

pub struct Arena {
    nodes: Vec<Node>,
    grows: u32,
    /// Largest block growth may reach; a power of two.
    limit: u64,
}

impl Arena {
    /// Fresh arena sized for `n` worst-case insertions, header written and
    /// one value block already split onto the lane free list.
    pub fn create(n: usize) -> Result<Self, Error> {
        let required = Self::required_bytes(INITIAL_MARK, false, true, n);
        let size = Self::checked_size(required, MAX_ARENA_BYTES)?;
        let mut nodes = Self::alloc_block(size)?;
        nodes.resize(size / NODE_SIZE, Node::ZERO);
        let mut arena = Arena {
            nodes,
            grows: 0,
            limit: MAX_ARENA_BYTES,
        };
        arena.reset();
        info!("[ARENA] created: size={} bytes, hint={}", size, n);
        Ok(arena)
    }

    /// Back to the just-created state, keeping the current block.
    pub fn reset(&mut self) {
        self.nodes.fill(Node::ZERO);
        let size = self.byte_len() as u32;
        self.set_hdr(HDR_MARK, NODE_SIZE as u32);
        self.set_hdr(HDR_SIZE, size);
        self.carve_value_block();
        debug_assert_eq!(self.mark(), INITIAL_MARK);
    }

    /// Guarantees headroom for `n` more worst-case insertions: two tree
    /// nodes each, plus value blocks for lanes the free list cannot cover.
    pub fn ensure(&mut self, n: usize) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let required = Self::required_bytes(
            self.mark(),
            self.hdr(HDR_NFRE) != 0,
            self.hdr(HDR_VFRE) != 0,
            n,
        );
        self.grow_to(required)
    }

    /// Moves the live prefix of the block (up to the mark) into a block of
    /// at least `required` bytes. No-op when it already fits.
    pub fn grow_to(&mut self, required: u64) -> Result<(), Error> {
        let old_size = self.size();
        if required <= old_size as u64 {
            return Ok(());
        }
        let new_size = Self::checked_size(required, self.limit)?;
        let mut fresh = Self::alloc_block(new_size)?;
        let live = self.mark() as usize / NODE_SIZE;
        fresh.extend_from_slice(&self.nodes[..live]);
        fresh.resize(new_size / NODE_SIZE, Node::ZERO);
        self.nodes = fresh;
        self.set_hdr(HDR_SIZE, new_size as u32);
        self.grows += 1;
        debug!(
            "[ARENA] grew {} -> {} bytes (mark={})",
            old_size,
            new_size,
            self.mark()
        );
        Ok(())
    }

    fn required_bytes(mark: u32, has_nfre: bool, has_vfre: bool, n: usize) -> u64 {
        let n = n.max(1) as u64;
        let tree_nodes = n.saturating_mul(2) - has_nfre as u64;
        let value_nodes = if has_vfre {
            (n - 1) / LANES_PER_BLOCK as u64
        } else {
            n.div_ceil(LANES_PER_BLOCK as u64)
        };
        (tree_nodes.saturating_add(value_nodes))
            .saturating_mul(NODE_SIZE as u64)
            .saturating_add(mark as u64)
    }

    fn checked_size(required: u64, limit: u64) -> Result<usize, Error> {
        if required > limit {
            return Err(Error::CapacityExceeded);
        }
        Ok(ceil_pow2(required).max(NODE_SIZE as u64 * 2) as usize)
    }

    /// Caps further growth below the offset range, so tests can reach
    /// `CapacityExceeded` without filling 512 MiB.
    #[cfg(test)]
    pub(crate) fn set_limit(&mut self, bytes: u64) {
        debug_assert!(bytes.is_power_of_two() && bytes <= MAX_ARENA_BYTES);
        self.limit = bytes;
    }

    fn alloc_block(size: usize) -> Result<Vec<Node>, Error> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(size / NODE_SIZE)
            .map_err(|_| Error::AllocFailed)?;
        Ok(nodes)
    }

    /// Pops the node free list, else bumps the mark. The caller must have
    /// made room with [`Arena::ensure`] first.
    pub fn alloc_node(&mut self) -> Offset {
        let head = self.hdr(HDR_NFRE);
        let off = if head != 0 {
            let next = self.node(head).words[0];
            self.set_hdr(HDR_NFRE, next);
            head
        } else {
            let mark = self.mark();
            assert!(
                mark as usize + NODE_SIZE <= self.size() as usize,
                "arena mark {mark} overran size {}; missing ensure()",
                self.size()
            );
            self.set_hdr(HDR_MARK, mark + NODE_SIZE as u32);
            mark
        };
        *self.node_mut(off) = Node::ZERO;
        off
    }

    pub fn free_node(&mut self, off: Offset) {
        debug_assert!(off != 0 && off as usize % NODE_SIZE == 0 && off < self.mark());
        let head = self.hdr(HDR_NFRE);
        let node = self.node_mut(off);
        *node = Node::ZERO;
        node.words[0] = head;
        self.set_hdr(HDR_NFRE, off);
    }

    pub fn free_node_count(&self) -> usize {
        let mut n = 0;
        let mut off = self.hdr(HDR_NFRE);
        while off != 0 && n < self.nodes.len() {
            n += 1;
            off = self.node(off).words[0];
        }
        n
    }

    // ---- raw access -------------------------------------------------------

    #[inline(always)]
    pub fn hdr(&self, word: usize) -> u32 {
        self.nodes[0].words[word]
    }

    #[inline(always)]
    pub fn set_hdr(&mut self, word: usize, v: u32) {
        self.nodes[0].words[word] = v;
    }

    #[inline(always)]
    pub fn mark(&self) -> u32 {
        self.hdr(HDR_MARK)
    }

    #[inline(always)]
    pub fn size(&self) -> u32 {
        self.hdr(HDR_SIZE)
    }

    #[inline(always)]
    pub fn byte_len(&self) -> usize {
        self.nodes.len() * NODE_SIZE
    }

    pub fn grows(&self) -> u32 {
        self.grows
    }

    #[inline(always)]
    pub fn node(&self, off: Offset) -> &Node {
        &self.nodes[off as usize / NODE_SIZE]
    }

    #[inline(always)]
    pub fn node_mut(&mut self, off: Offset) -> &mut Node {
        &mut self.nodes[off as usize / NODE_SIZE]
    }

    #[inline(always)]
    pub fn slot(&self, s: SlotRef) -> u32 {
        self.node(s.node()).words[s.index()]
    }

    #[inline(always)]
    pub fn set_slot(&mut self, s: SlotRef, v: u32) {
        let i = s.index();
        self.node_mut(s.node()).words[i] = v;
    }

    #[inline(always)]
    pub fn lane(&self, lane: Lane) -> u64 {
        self.nodes[lane as usize / LANES_PER_NODE].lane(lane as usize % LANES_PER_NODE)
    }

    #[inline(always)]
    pub fn set_lane(&mut self, lane: Lane, v: u64) {
        self.nodes[lane as usize / LANES_PER_NODE].set_lane(lane as usize % LANES_PER_NODE, v);
    }
}
