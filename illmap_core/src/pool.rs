//! Value box pool: 64-bit lanes carved out of arena nodes.
//!
//! A block is one node: lane 0 links to the previously carved block, lanes
//! 1..8 hold values. Free lanes form a chain through their own contents,
//! headed by `HDR_VFRE`. Blocks are never handed back to the node allocator.

use crate::arena::Arena;
use crate::constants::*;
use crate::types::Lane;
use log::debug;

impl Arena {
    /// Takes one node and threads its seven value lanes onto the free list.
    pub(crate) fn carve_value_block(&mut self) {
        let blk = self.alloc_node();
        let base = blk / 8;
        self.set_lane(base, self.hdr(HDR_VBLK) as u64);
        self.set_hdr(HDR_VBLK, blk);
        let mut next = self.hdr(HDR_VFRE);
        for i in (1..LANES_PER_NODE as u32).rev() {
            self.set_lane(base + i, next as u64);
            next = base + i;
        }
        self.set_hdr(HDR_VFRE, next);
        debug!("[POOL] carved value block at offset={}", blk);
    }

    /// Makes sure [`Arena::alloc_lane`] will not run past the mark.
    pub fn ensure_lane(&mut self) -> Result<(), crate::types::Error> {
        if self.hdr(HDR_VFRE) != 0 || self.hdr(HDR_NFRE) != 0 {
            return Ok(());
        }
        self.grow_to(self.mark() as u64 + NODE_SIZE as u64)
    }

    pub fn alloc_lane(&mut self) -> Lane {
        if self.hdr(HDR_VFRE) == 0 {
            self.carve_value_block();
        }
        let lane = self.hdr(HDR_VFRE);
        let next = self.lane(lane) as u32;
        self.set_hdr(HDR_VFRE, next);
        self.set_lane(lane, 0);
        lane
    }

    pub fn free_lane(&mut self, lane: Lane) {
        debug_assert!(lane as usize % LANES_PER_NODE != 0, "lane 0 is a block link");
        let head = self.hdr(HDR_VFRE);
        self.set_lane(lane, head as u64);
        self.set_hdr(HDR_VFRE, lane);
    }

    pub fn free_lane_count(&self) -> usize {
        let bound = self.mark() as usize / 8;
        let mut n = 0;
        let mut lane = self.hdr(HDR_VFRE);
        while lane != 0 && n < bound {
            n += 1;
            lane = self.lane(lane) as u32;
        }
        n
    }

    /// Offsets of every carved value block, newest first.
    pub fn value_blocks(&self) -> Vec<u32> {
        let bound = self.mark() as usize / NODE_SIZE;
        let mut out = Vec::new();
        let mut blk = self.hdr(HDR_VBLK);
        while blk != 0 && out.len() < bound {
            out.push(blk);
            blk = self.lane(blk / 8) as u32;
        }
        out
    }
}
