//! Constants and layout for the arena, slots and header

/// Every allocation unit in the arena: tree node, value block, free cell.
pub const NODE_SIZE: usize = 64;
pub const SLOTS_PER_NODE: usize = 16;
pub const LANES_PER_NODE: usize = 8;
/// Value lanes handed out per pool block; lane 0 of the block is its link word.
pub const LANES_PER_BLOCK: usize = LANES_PER_NODE - 1;

/// A boxed slot carries a 26-bit lane index, i.e. 2^26 lanes of 8 bytes.
pub const MAX_ARENA_BYTES: u64 = 0x2000_0000;

/// Branch position given to the header's root slot; above any real nibble.
pub const ROOT_POS: u32 = 16;
/// Longest root-to-leaf chain of tree nodes (one per nibble of a u64).
pub const MAX_DEPTH: usize = 16;
/// Slots visited by a descent: the header's root slot plus one per node.
pub const PATH_DEPTH: usize = MAX_DEPTH + 1;

// ---- slot word layout ----------------------------------------------------
pub const SLOT_PMASK: u32 = 0x0000_000f; // prefix nibble owned by the node
pub const SLOT_NODE: u32 = 0x0000_0010; // high bits: child node byte offset
pub const SLOT_SCALAR: u32 = 0x0000_0020; // high bits: inline payload
pub const SLOT_VALUE: u32 = 0xffff_ffe0;
pub const SLOT_SHIFT: u32 = 6;

// ---- header node (offset 0) word indices --------------------------------
pub const HDR_ROOT: usize = 0; // root slot
pub const HDR_VBLK: usize = 1; // most recently carved value block
pub const HDR_MARK: usize = 2; // growth mark, bytes
pub const HDR_SIZE: usize = 3; // backing size, bytes
pub const HDR_NFRE: usize = 4; // node free-list head (byte offset)
pub const HDR_VFRE: usize = 5; // lane free-list head (lane index)

/// Header plus the value block primed at creation.
pub const INITIAL_MARK: u32 = 2 * NODE_SIZE as u32;
