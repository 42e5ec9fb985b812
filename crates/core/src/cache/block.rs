//! Cache block shells.

use crate::common::INVALID_BLOCK;

/// Stable coordinates of a block in the hierarchy: (level, set, way).
///
/// Used for the inclusive back-link from a block to its parent in the level
/// below. A coordinate is a navigation aid, not ownership: holders must
/// re-validate the tag at the coordinate before trusting it, since the lower
/// shell may have been re-stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCoord {
    /// Cache level (0 = closest to the CPU).
    pub level: usize,
    /// Set index within the level.
    pub set: usize,
    /// Way index within the set's arena.
    pub way: usize,
}

/// One cache block shell.
///
/// Shells are allocated when their set is constructed and reused (reset, not
/// freed) on every eviction. A shell whose address equals the invalid
/// sentinel holds no line and never appears in statistics or write-backs.
#[derive(Debug, Clone)]
pub struct CacheBlock {
    /// Full block-aligned physical address, or [`INVALID_BLOCK`].
    pub addr: u64,
    /// Address with the offset and set-index fields stripped.
    pub tag: u64,
    /// The block holds bytes not yet written back to the level below.
    pub dirty: bool,
    /// A copy of this line is resident in the level above.
    pub in_upper_level: bool,
    /// Back-link to the same line in the level below (inclusive bookkeeping).
    pub parent_in_lower: Option<BlockCoord>,
}

impl CacheBlock {
    /// Creates an empty shell.
    pub fn new() -> Self {
        Self {
            addr: INVALID_BLOCK,
            tag: 0,
            dirty: false,
            in_upper_level: false,
            parent_in_lower: None,
        }
    }

    /// True when the shell holds no line.
    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.addr == INVALID_BLOCK
    }

    /// Re-stamps an evicted shell with a new line, clearing all per-line
    /// state.
    pub fn restamp(&mut self, addr: u64, tag: u64) {
        self.addr = addr;
        self.tag = tag;
        self.dirty = false;
        self.in_upper_level = false;
        self.parent_in_lower = None;
    }
}

impl Default for CacheBlock {
    fn default() -> Self {
        Self::new()
    }
}
