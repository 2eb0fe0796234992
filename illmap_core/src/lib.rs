pub mod arena;
pub mod constants;
pub mod errors;
pub mod helpers;
pub mod iter;
mod pool;
pub mod public_api;
pub mod telemetry;
pub mod types;
mod verify;

pub use iter::{Cursor, Iter};
pub use types::{Error, IntMap, MapStats, SlotKind, SlotRef};

use arena::Arena;
use constants::*;
use helpers::*;
use log::{debug, info, warn};
#[cfg(feature = "trace")]
use log::trace;
use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use std::ops::ControlFlow;
use types::Offset;

impl IntMap {
    // ---- logging / metrics bootstrap -----------------------------------------
    fn bootstrap() {
        static INIT: OnceCell<()> = OnceCell::new();
        INIT.get_or_init(|| {
            let _ = env_logger::builder()
                .format_timestamp(None)
                .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
                .try_init();
            telemetry::init();
        });
    }

    /// Empty map; the arena is created by the first insert.
    pub fn new() -> Self {
        Self::bootstrap();
        Self::default()
    }

    /// Map pre-sized for `capacity` insertions. `0` defers the arena.
    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        let mut map = Self::new();
        map.reserve(capacity)?;
        Ok(map)
    }

    /// Explicitly release the map. The whole arena is a single block, so
    /// this is one deallocation regardless of how many entries were live.
    pub fn destroy(self) {
        info!(
            "[DESTROY] entries={}, arena_bytes={}",
            self.len,
            self.arena.as_ref().map_or(0, Arena::byte_len)
        );
    }

    /// Headroom for `additional` worst-case insertions; creates the arena
    /// when there is none yet.
    pub fn reserve(&mut self, additional: usize) -> Result<(), Error> {
        if additional == 0 {
            return Ok(());
        }
        let res = match self.arena.as_mut() {
            Some(arena) => {
                let before = arena.grows();
                arena.ensure(additional).map(|()| {
                    if arena.grows() != before {
                        counter!("illmap_grows_total").increment(1);
                        gauge!("illmap_arena_bytes").set(arena.byte_len() as f64);
                    }
                })
            }
            None => Arena::create(additional).map(|arena| {
                gauge!("illmap_arena_bytes").set(arena.byte_len() as f64);
                self.arena = Some(arena);
            }),
        };
        if let Err(e) = res {
            counter!("illmap_alloc_failures_total").increment(1);
            warn!("[RESERVE] additional={} failed: {}", additional, e);
        }
        res
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert or overwrite. On error the map is left exactly as it was.
    /// Overwriting a boxed value never allocates, so it succeeds even when
    /// the arena is at its limit.
    pub fn set(&mut self, key: u64, value: u64) -> Result<(), Error> {
        counter!("illmap_sets_total").increment(1);
        let slot = match self.lookup(key) {
            Some(slot) => slot,
            None => self.assign(key)?,
        };
        self.set_value(slot, value)
    }

    pub fn get(&self, key: u64) -> Option<u64> {
        self.lookup(key).and_then(|slot| self.get_value(slot))
    }

    pub fn has(&self, key: u64) -> bool {
        self.lookup(key).is_some()
    }

    /// Returns `false` if `key` was not present.
    pub fn delete(&mut self, key: u64) -> bool {
        let found = self.remove(key);
        if found {
            counter!("illmap_deletes_total").increment(1);
        }
        found
    }

    /// Calls `f` for each entry until it breaks.
    pub fn for_each<F>(&self, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(u64, u64) -> ControlFlow<()>,
    {
        for (k, v) in self.iter() {
            f(k, v)?;
        }
        ControlFlow::Continue(())
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Bulk insert; stops at the first failure.
    pub fn set_many(&mut self, items: &[(u64, u64)]) -> Result<(), Error> {
        self.reserve(items.len())?;
        for &(k, v) in items {
            self.set(k, v)?;
        }
        Ok(())
    }

    /// Drops every entry but keeps the backing block for reuse.
    pub fn clear(&mut self) {
        info!("[CLEAR] dropping {} entries", self.len);
        if let Some(arena) = self.arena.as_mut() {
            arena.reset();
        }
        self.len = 0;
    }

    pub fn stats(&self) -> MapStats {
        let Some(arena) = self.arena.as_ref() else {
            return MapStats::default();
        };
        let free_nodes = arena.free_node_count();
        let value_blocks = arena.value_blocks().len();
        let mark_nodes = arena.mark() as usize / NODE_SIZE;
        MapStats {
            entries: self.len,
            arena_bytes: arena.byte_len(),
            mark_bytes: arena.mark() as usize,
            tree_nodes: mark_nodes.saturating_sub(1 + free_nodes + value_blocks),
            free_nodes,
            value_blocks,
            free_lanes: arena.free_lane_count(),
            grows: arena.grows(),
        }
    }

    /// Emit gauges (caller decides cadence).
    pub fn report_capacity_metrics(&self) {
        let s = self.stats();
        gauge!("illmap_entries").set(s.entries as f64);
        gauge!("illmap_arena_bytes").set(s.arena_bytes as f64);
        gauge!("illmap_free_nodes").set(s.free_nodes as f64);
        gauge!("illmap_free_lanes").set(s.free_lanes as f64);
    }

    // ---- trie engine ---------------------------------------------------------

    /// Value slot of `key`, if present. Only the leaf's prefix is compared;
    /// inner nodes are passed on the key's nibble alone.
    pub fn lookup(&self, key: u64) -> Option<SlotRef> {
        let arena = self.arena.as_ref()?;
        let mut node: Offset = 0;
        let mut posn = ROOT_POS;
        let mut dirn = HDR_ROOT;
        loop {
            let slot = SlotRef::new(node, dirn);
            match decode(arena.slot(slot)) {
                SlotKind::Child(child) => {
                    node = child;
                    posn = node_pos(arena.node(child));
                    dirn = xdir(key, posn);
                    #[cfg(feature = "trace")]
                    trace!("[LOOKUP] key={:#x} node={} pos={} dir={}", key, node, posn, dirn);
                }
                SlotKind::Empty => return None,
                SlotKind::Boxed(_) | SlotKind::Scalar(_) => {
                    debug_assert_eq!(posn, 0, "value slot above leaf level");
                    return (node_prefix(arena.node(node)) == xpfx(key, 0)).then_some(slot);
                }
            }
        }
    }

    /// Slot for `key`, creating the path to it when missing. An existing
    /// key returns its current slot with the tree left untouched.
    ///
    /// A fresh slot is empty; fill it with [`IntMap::set_value`] before
    /// the next mutation or the new leaf stays behind empty.
    #[doc(hidden)]
    pub fn assign(&mut self, key: u64) -> Result<SlotRef, Error> {
        // after this nothing below can run out of room
        self.reserve(1)?;
        let arena = self
            .arena
            .as_mut()
            .ok_or(Error::Corrupted("no arena after reserve"))?;

        let mut stack = [(SlotRef(0), 0u32); PATH_DEPTH];
        let mut sp = 0;
        let mut node: Offset = 0;
        let mut posn = ROOT_POS;
        let mut dirn = HDR_ROOT;
        loop {
            let slot = SlotRef::new(node, dirn);
            let sval = arena.slot(slot);
            stack[sp] = (slot, posn);
            sp += 1;
            if let SlotKind::Child(child) = decode(sval) {
                node = child;
                posn = node_pos(arena.node(child));
                dirn = xdir(key, posn);
                #[cfg(feature = "trace")]
                trace!("[ASSIGN] key={:#x} node={} pos={} dir={}", key, node, posn, dirn);
                continue;
            }

            let prfx = if posn == ROOT_POS {
                0
            } else {
                node_prefix(arena.node(node))
            };
            if posn == 0 && prfx == xpfx(key, 0) {
                return Ok(slot);
            }

            // climb back to the first slot whose node branches above `diff`
            let diff = diff_pos(prfx, key);
            let mut si = sp;
            let mut p = posn;
            while diff > p {
                si -= 1;
                p = stack[si].1;
            }

            let leaf = if si != sp {
                let split = stack[si].0;
                let old = arena.slot(split);
                debug_assert!(is_child(old), "split point is not a child slot");
                let branch = arena.alloc_node();
                let leaf = arena.alloc_node();
                arena.set_slot(split, child_slot(old, branch));
                let b = arena.node_mut(branch);
                b.words[xdir(prfx, diff)] = old;
                b.words[xdir(key, diff)] = SLOT_NODE | leaf;
                set_node_prefix(b, xpfx(prfx, diff) | diff as u64);
                debug!(
                    "[ASSIGN] split key={:#x} at nibble {} (branch={}, leaf={})",
                    key, diff, branch, leaf
                );
                leaf
            } else {
                let leaf = arena.alloc_node();
                arena.set_slot(slot, child_slot(sval, leaf));
                leaf
            };
            set_node_prefix(arena.node_mut(leaf), xpfx(key, 0));
            return Ok(SlotRef::new(leaf, xdir(key, 0)));
        }
    }

    /// Unlinks `key` and folds away nodes the removal left empty or with a
    /// single child. Returns `false` if `key` was absent.
    pub fn remove(&mut self, key: u64) -> bool {
        let Some(arena) = self.arena.as_mut() else {
            return false;
        };

        // slots referencing each node on the path, root slot first
        let mut stack = [SlotRef(0); PATH_DEPTH];
        let mut sp = 0;
        let mut node: Offset = 0;
        let mut posn = ROOT_POS;
        let mut dirn = HDR_ROOT;
        let slot = loop {
            let slot = SlotRef::new(node, dirn);
            match decode(arena.slot(slot)) {
                SlotKind::Child(child) => {
                    stack[sp] = slot;
                    sp += 1;
                    node = child;
                    posn = node_pos(arena.node(child));
                    dirn = xdir(key, posn);
                }
                SlotKind::Empty => return false,
                SlotKind::Boxed(_) | SlotKind::Scalar(_) => {
                    debug_assert_eq!(posn, 0, "value slot above leaf level");
                    if node_prefix(arena.node(node)) != xpfx(key, 0) {
                        return false;
                    }
                    break slot;
                }
            }
        };

        release_value(arena, slot);
        self.len -= 1;

        while sp > 0 {
            sp -= 1;
            let parent = stack[sp];
            let pval = arena.slot(parent);
            let child = pval & SLOT_VALUE;
            let words = arena.node(child).words;
            let mut live = words.into_iter().filter(|&w| is_occupied(w));
            match (live.next(), live.next()) {
                (None, _) => {
                    arena.set_slot(parent, cleared(pval));
                    arena.free_node(child);
                    debug!("[REMOVE] freed empty node {}", child);
                }
                (Some(only), None) if is_child(only) => {
                    arena.set_slot(parent, graft(pval, only));
                    arena.free_node(child);
                    debug!("[REMOVE] collapsed node {} into its parent", child);
                }
                _ => break,
            }
        }
        true
    }

    pub fn get_value(&self, slot: SlotRef) -> Option<u64> {
        let arena = self.arena.as_ref()?;
        match decode(arena.slot(slot)) {
            SlotKind::Boxed(lane) => Some(arena.lane(lane)),
            SlotKind::Scalar(v) => Some(v as u64),
            SlotKind::Empty | SlotKind::Child(_) => None,
        }
    }

    /// Stores `value` in a leaf slot, overwriting its box in place or
    /// taking a new box from the pool.
    pub fn set_value(&mut self, slot: SlotRef, value: u64) -> Result<(), Error> {
        let arena = self
            .arena
            .as_mut()
            .ok_or(Error::Corrupted("slot of a map without arena"))?;
        let sval = arena.slot(slot);
        match decode(sval) {
            SlotKind::Boxed(lane) => arena.set_lane(lane, value),
            SlotKind::Child(_) => return Err(Error::Corrupted("value written over a child")),
            kind @ (SlotKind::Empty | SlotKind::Scalar(_)) => {
                if slot.node() == 0 || node_pos(arena.node(slot.node())) != 0 {
                    return Err(Error::Corrupted("value slot outside a leaf"));
                }
                arena.ensure_lane()?;
                let lane = arena.alloc_lane();
                arena.set_lane(lane, value);
                arena.set_slot(slot, boxed_slot(sval, lane));
                if kind == SlotKind::Empty {
                    self.len += 1;
                }
            }
        }
        Ok(())
    }

    /// Takes the value out of a leaf slot, returning its box to the pool
    /// and folding the path exactly as [`IntMap::remove`] does.
    pub fn del_value(&mut self, slot: SlotRef) -> Option<u64> {
        let old = self.get_value(slot)?;
        let arena = self.arena.as_ref()?;
        // values only live in leaves, so prefix and slot index give the key
        let key = node_prefix(arena.node(slot.node())) | slot.index() as u64;
        self.remove(key).then_some(old)
    }
}

/// Clears a value slot, returning its box to the pool.
fn release_value(arena: &mut Arena, slot: SlotRef) {
    let sval = arena.slot(slot);
    if let SlotKind::Boxed(lane) = decode(sval) {
        arena.free_lane(lane);
    }
    arena.set_slot(slot, cleared(sval));
}

impl std::fmt::Debug for IntMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a IntMap {
    type Item = (u64, u64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl Drop for IntMap {
    fn drop(&mut self) {
        // the arena Vec is the only allocation
        if let Some(arena) = self.arena.take() {
            debug!("[DROP] releasing {} arena bytes", arena.byte_len());
        }
    }
}
