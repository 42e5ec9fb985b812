//! The N-level inclusive cache hierarchy.
//!
//! Lookup walks from L0 outward; a hit promotes the line into every level
//! above the hit level. A miss at the last level loads the line into the LLC
//! (possibly emitting a write-back for a dirty victim) and then fills each
//! upper level in turn. Inclusion is maintained with two flags: every block
//! resident at level ℓ is also resident at every level below it, the lower
//! copy carries `in_upper_level`, and the upper copy carries a coordinate
//! back-link to the lower one.

use std::io::Write;

use crate::common::error::ConfigError;
use crate::common::{INVALID_BLOCK, floor_log2, is_power_of_two};
use crate::config::CacheParams;

use super::block::BlockCoord;
use super::set::CacheSet;

/// Memory operation kind as seen by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOp {
    /// Data read (prefetches are folded into reads by the trace reader).
    Read,
    /// Data write.
    Write,
}

/// Outcome of one cache access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheAccess {
    /// The access hit somewhere in the hierarchy.
    pub hit: bool,
    /// Level that satisfied the access (`None` on a full miss).
    pub level: Option<usize>,
    /// Block address of a dirty LLC victim that must be written back to
    /// DRAM, if the fill evicted one.
    pub writeback: Option<u64>,
}

/// Per-level access counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct LevelStats {
    /// Read accesses that reached this level.
    pub reads: u64,
    /// Reads satisfied at this level.
    pub reads_hit: u64,
    /// Reads that missed at this level.
    pub reads_miss: u64,
    /// Write accesses that reached this level.
    pub writes: u64,
    /// Writes satisfied at this level.
    pub writes_hit: u64,
    /// Writes that missed at this level.
    pub writes_miss: u64,
}

/// Geometry and storage of one cache level.
#[derive(Debug)]
struct CacheLevel {
    block_size: u64,
    ways: usize,
    set_count: usize,
    offset_bits: u32,
    set_bits: u32,
    offset_mask: u64,
    set_mask: u64,
    sets: Vec<CacheSet>,
    stats: LevelStats,
}

impl CacheLevel {
    /// Splits an address into (tag, set index).
    #[inline]
    fn decompose(&self, addr: u64) -> (u64, usize) {
        let without_offset = addr >> self.offset_bits;
        let set = (without_offset & self.set_mask) as usize;
        let tag = without_offset >> self.set_bits;
        (tag, set)
    }

    /// Inverse of [`Self::decompose`]; reproduces the address bit-exactly.
    #[inline]
    fn recompose(&self, tag: u64, set: usize, offset: u64) -> u64 {
        (((tag << self.set_bits) | set as u64) << self.offset_bits) | (offset & self.offset_mask)
    }
}

/// The full cache hierarchy, level 0 closest to the CPU.
#[derive(Debug)]
pub struct CacheHierarchy {
    levels: Vec<CacheLevel>,
    shared_llc: bool,
    hit_count: u64,
    miss_count: u64,
    total_count: u64,
    evicted_llc_count: u64,
}

impl CacheHierarchy {
    /// Builds the hierarchy, validating the geometry.
    ///
    /// # Errors
    ///
    /// Rejects a zero or non-power-of-two block size, a capacity not
    /// divisible by `ways × block_size`, block sizes differing across levels
    /// (inclusion requires one line granularity), a non-power-of-two set
    /// count, and any level whose sets could be fully pinned by the levels
    /// above it.
    pub fn new(params: &CacheParams) -> Result<Self, ConfigError> {
        if params.levels.is_empty() {
            return Err(ConfigError::Invalid("cache needs at least one level".into()));
        }

        let block_size = params.levels[0].block_size;
        let mut levels = Vec::with_capacity(params.levels.len());
        for (i, lp) in params.levels.iter().enumerate() {
            if !is_power_of_two(lp.block_size) {
                return Err(ConfigError::Invalid(format!(
                    "L{i} block size {} is not a power of two",
                    lp.block_size
                )));
            }
            if lp.block_size != block_size {
                return Err(ConfigError::Invalid(format!(
                    "L{i} block size {} differs from L0's {block_size}; inclusion \
                     requires a uniform line size",
                    lp.block_size
                )));
            }
            if lp.ways == 0 {
                return Err(ConfigError::Invalid(format!("L{i} has zero ways")));
            }
            let set_bytes = lp.block_size * lp.ways as u64;
            if lp.capacity == 0 || lp.capacity % set_bytes != 0 {
                return Err(ConfigError::Invalid(format!(
                    "L{i} capacity {} is not a multiple of ways x block size ({set_bytes})",
                    lp.capacity
                )));
            }
            let set_count = (lp.capacity / set_bytes) as usize;
            if !is_power_of_two(set_count as u64) {
                return Err(ConfigError::Invalid(format!(
                    "L{i} set count {set_count} is not a power of two"
                )));
            }

            let offset_bits = floor_log2(lp.block_size);
            let set_bits = floor_log2(set_count as u64);
            levels.push(CacheLevel {
                block_size: lp.block_size,
                ways: lp.ways,
                set_count,
                offset_bits,
                set_bits,
                offset_mask: (1 << offset_bits) - 1,
                set_mask: (1 << set_bits) - 1,
                sets: (0..set_count).map(|_| CacheSet::new(lp.ways)).collect(),
                stats: LevelStats::default(),
            });
        }

        // Eviction scans for an unpinned victim and must never reach the MRU:
        // every level needs more ways than the levels above it can pin in one
        // of its sets.
        for l in 1..levels.len() {
            let mut pinnable = 0usize;
            for u in 0..l {
                let fold = (levels[u].set_count / levels[l].set_count).max(1);
                pinnable += levels[u].ways * fold;
            }
            if levels[l].ways <= pinnable {
                return Err(ConfigError::Invalid(format!(
                    "L{l} associativity {} does not exceed the {pinnable} blocks \
                     the upper levels can pin in one of its sets",
                    levels[l].ways
                )));
            }
        }

        Ok(Self {
            levels,
            shared_llc: params.shared_llc,
            hit_count: 0,
            miss_count: 0,
            total_count: 0,
            evicted_llc_count: 0,
        })
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Uniform block size in bytes.
    pub fn block_size(&self) -> u64 {
        self.levels[0].block_size
    }

    /// Whether the last level is shared across cores.
    pub fn shared_llc(&self) -> bool {
        self.shared_llc
    }

    /// Counters for one level.
    pub fn level_stats(&self, level: usize) -> &LevelStats {
        &self.levels[level].stats
    }

    /// (hits, misses, total) across the hierarchy.
    pub fn totals(&self) -> (u64, u64, u64) {
        (self.hit_count, self.miss_count, self.total_count)
    }

    /// Lines evicted from the last level since construction.
    pub fn llc_evictions(&self) -> u64 {
        self.evicted_llc_count
    }

    /// Splits `addr` for `level`; exposed for address-law tests.
    pub fn decompose(&self, addr: u64, level: usize) -> (u64, usize, u64) {
        let (tag, set) = self.levels[level].decompose(addr);
        (tag, set, addr & self.levels[level].offset_mask)
    }

    /// Inverse of [`Self::decompose`].
    pub fn recompose(&self, tag: u64, set: usize, offset: u64, level: usize) -> u64 {
        self.levels[level].recompose(tag, set, offset)
    }

    /// Performs one access, maintaining LRU, inclusion, and statistics.
    ///
    /// On a hit at level ℓ the line is promoted into every level above ℓ; on
    /// a full miss the line is loaded into the LLC first and then filled
    /// upward. A dirty LLC victim surfaces in the result as a write-back
    /// address, the hierarchy's only outward-bound traffic besides the
    /// demand misses themselves.
    pub fn access(&mut self, addr: u64, op: MemOp) -> CacheAccess {
        self.total_count += 1;
        let level_count = self.levels.len();

        let mut hit_level = None;
        for l in 0..level_count {
            let (tag, set_idx) = self.levels[l].decompose(addr);
            let hit = {
                let set = &mut self.levels[l].sets[set_idx];
                match set.find(tag) {
                    Some(way) => {
                        set.touch(way);
                        true
                    }
                    None => false,
                }
            };
            let stats = &mut self.levels[l].stats;
            match op {
                MemOp::Read => {
                    stats.reads += 1;
                    if hit {
                        stats.reads_hit += 1;
                    } else {
                        stats.reads_miss += 1;
                    }
                }
                MemOp::Write => {
                    stats.writes += 1;
                    if hit {
                        stats.writes_hit += 1;
                    } else {
                        stats.writes_miss += 1;
                    }
                }
            }
            if hit {
                hit_level = Some(l);
                break;
            }
        }

        let mut writeback = None;
        let fill_from = match hit_level {
            Some(l) => {
                self.hit_count += 1;
                l
            }
            None => {
                self.miss_count += 1;
                writeback = self.fill_llc(addr);
                level_count - 1
            }
        };

        // Promote into every level above the one that supplied the line.
        for upper in (0..fill_from).rev() {
            self.fill_upper(upper, addr);
        }

        // The accessed line now sits at the MRU of its L0 set.
        if op == MemOp::Write {
            let (tag, set_idx) = self.levels[0].decompose(addr);
            let set = &mut self.levels[0].sets[set_idx];
            let mru = set.mru();
            assert_eq!(set.block(mru).tag, tag, "promoted line is not the L0 MRU");
            set.block_mut(mru).dirty = true;
        }

        CacheAccess {
            hit: hit_level.is_some(),
            level: hit_level,
            writeback,
        }
    }

    /// Loads a fresh line into the LLC, returning the address of a dirty
    /// victim to write back (if any).
    fn fill_llc(&mut self, addr: u64) -> Option<u64> {
        let last = self.levels.len() - 1;
        let (tag, set_idx) = self.levels[last].decompose(addr);
        let set = &mut self.levels[last].sets[set_idx];

        let way = set.evict_victim();
        self.evicted_llc_count += 1;

        let victim = set.block_mut(way);
        let writeback = (!victim.is_invalid() && victim.dirty).then_some(victim.addr);
        victim.restamp(addr, tag);
        set.install_at_mru(way);
        writeback
    }

    /// Fills level `upper` from level `upper + 1` (which already holds the
    /// line at its MRU position).
    fn fill_upper(&mut self, upper: usize, addr: u64) {
        let lower = upper + 1;
        let (upper_tag, upper_set_idx) = self.levels[upper].decompose(addr);
        let (lower_tag, lower_set_idx) = self.levels[lower].decompose(addr);

        let (head, tail) = self.levels.split_at_mut(lower);
        let upper_level = &mut head[upper];
        let lower_level = &mut tail[0];

        let upper_set = &mut upper_level.sets[upper_set_idx];
        let way = upper_set.evict_victim();
        let victim_addr = upper_set.block(way).addr;
        let victim_dirty = upper_set.block(way).dirty;
        let victim_parent = upper_set.block(way).parent_in_lower;

        if victim_addr != INVALID_BLOCK {
            // The victim's copy in the level below stays resident; push the
            // dirty state down and release the pin. The upper tag is not
            // reusable here; the lower level slices the address differently.
            let (wb_tag, wb_set_idx) = lower_level.decompose(victim_addr);
            let wb_set = &mut lower_level.sets[wb_set_idx];
            let wb_way = wb_set.find(wb_tag).unwrap_or_else(|| {
                panic!(
                    "inclusion violated: block {victim_addr:#x} evicted from L{upper} \
                     has no copy in L{lower}"
                )
            });
            if let Some(coord) = victim_parent {
                assert_eq!(
                    coord,
                    BlockCoord {
                        level: lower,
                        set: wb_set_idx,
                        way: wb_way
                    },
                    "stale parent link on block {victim_addr:#x}"
                );
            }
            let wb_block = wb_set.block_mut(wb_way);
            assert!(
                wb_block.in_upper_level,
                "lower copy of {victim_addr:#x} lost its upper-level pin"
            );
            wb_block.in_upper_level = false;
            wb_block.dirty = victim_dirty;
        }

        // Link the re-stamped shell to the line's lower copy, which the
        // previous fill (or the hit) left at the lower MRU.
        let lower_set = &mut lower_level.sets[lower_set_idx];
        let lower_mru = lower_set.mru();
        assert_eq!(
            lower_set.block(lower_mru).tag,
            lower_tag,
            "line {addr:#x} is not at the L{lower} MRU during an upper fill"
        );
        lower_set.block_mut(lower_mru).in_upper_level = true;
        let lower_dirty = lower_set.block(lower_mru).dirty;

        let upper_set = &mut upper_level.sets[upper_set_idx];
        let shell = upper_set.block_mut(way);
        shell.restamp(addr, upper_tag);
        shell.dirty = lower_dirty;
        shell.parent_in_lower = Some(BlockCoord {
            level: lower,
            set: lower_set_idx,
            way: lower_mru,
        });
        upper_set.install_at_mru(way);
    }

    /// Looks up whether `addr` is resident at `level` (no LRU side effects).
    pub fn probe(&self, addr: u64, level: usize) -> Option<(usize, usize)> {
        let (tag, set_idx) = self.levels[level].decompose(addr);
        self.levels[level].sets[set_idx]
            .find(tag)
            .map(|way| (set_idx, way))
    }

    /// Immutable view of a block for tests and invariant checks.
    pub fn block_at(&self, coord: BlockCoord) -> &super::block::CacheBlock {
        self.levels[coord.level].sets[coord.set].block(coord.way)
    }

    /// Writes the per-level statistics block in the run-log format.
    pub fn dump_statistics(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "==== Cache statistics ====")?;
        for (i, level) in self.levels.iter().enumerate() {
            let s = &level.stats;
            writeln!(
                out,
                "L{i}: reads={} read_hits={} read_misses={} writes={} write_hits={} write_misses={}",
                s.reads, s.reads_hit, s.reads_miss, s.writes, s.writes_hit, s.writes_miss
            )?;
        }
        let total = self.total_count.max(1);
        writeln!(
            out,
            "hit: {} miss: {} total: {} hit rate: {:.4} evicted LLC count: {}",
            self.hit_count,
            self.miss_count,
            self.total_count,
            self.hit_count as f64 / total as f64,
            self.evicted_llc_count
        )
    }

    /// Checks the hierarchy invariants (set cardinality, recency permutation,
    /// counter consistency, inclusion). Test-support; not on the access path.
    pub fn check_invariants(&self) {
        for (i, level) in self.levels.iter().enumerate() {
            for set in &level.sets {
                assert_eq!(set.way_count(), level.ways, "L{i} set cardinality");
                set.check_invariants();
            }
            let s = &level.stats;
            assert_eq!(s.reads, s.reads_hit + s.reads_miss, "L{i} read counters");
            assert_eq!(s.writes, s.writes_hit + s.writes_miss, "L{i} write counters");
        }
        // Inclusion: every valid block has a copy at every level below.
        for upper in 0..self.levels.len() - 1 {
            for set in &self.levels[upper].sets {
                for way in set.recency_order() {
                    let block = set.block(way);
                    if block.is_invalid() {
                        continue;
                    }
                    for lower in upper + 1..self.levels.len() {
                        assert!(
                            self.probe(block.addr, lower).is_some(),
                            "inclusion violated for {:#x}: present at L{upper}, absent at L{lower}",
                            block.addr
                        );
                    }
                }
            }
        }
    }
}
