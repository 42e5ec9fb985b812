//! Cache hierarchy tests: lookup walk, inclusion, promotion, write-backs.
//!
//! The baseline geometry is two levels (L0: 2 sets x 2 ways, L1: 4 sets x
//! 8 ways, 64-byte blocks), so set collisions are easy to construct: bit 6
//! selects the L0 set, bits 6..8 the L1 set.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use memsim_core::cache::{CacheHierarchy, MemOp};
use memsim_core::config::{CacheLevelParams, CacheParams};

use crate::common::{config_with, test_config};

fn two_level() -> CacheHierarchy {
    CacheHierarchy::new(&test_config().cache).expect("valid geometry")
}

/// L0 direct-mapped variant (1 way, 2 sets) for eviction-order tests.
fn two_level_l0_direct() -> CacheHierarchy {
    let config = config_with(&[("CACHE_L0_CAPACITY", "128"), ("CACHE_L0_WAYS", "1")]);
    CacheHierarchy::new(&config.cache).expect("valid geometry")
}

fn single_level() -> CacheHierarchy {
    let config = config_with(&[("CACHE_LEVELS", "1"), ("CACHE_L0_CAPACITY", "256")]);
    CacheHierarchy::new(&config.cache).expect("valid geometry")
}

// ══════════════════════════════════════════════════════════
// 1. Basic hit/miss behavior
// ══════════════════════════════════════════════════════════

/// Two consecutive reads to the same 64-byte line: one miss, then one hit.
#[test]
fn second_read_to_same_line_hits() {
    let mut cache = two_level();

    let first = cache.access(0x1000, MemOp::Read);
    assert!(!first.hit);
    assert_eq!(first.level, None);

    // A different offset in the same line.
    let second = cache.access(0x1020, MemOp::Read);
    assert!(second.hit);
    assert_eq!(second.level, Some(0));

    let l0 = cache.level_stats(0);
    assert_eq!((l0.reads, l0.reads_hit, l0.reads_miss), (2, 1, 1));
    cache.check_invariants();
}

#[test]
fn miss_installs_line_at_every_level() {
    let mut cache = two_level();
    let _ = cache.access(0x4000, MemOp::Read);
    assert!(cache.probe(0x4000, 0).is_some());
    assert!(cache.probe(0x4000, 1).is_some());

    // The LLC copy is pinned by the upper copy.
    let (set, way) = cache.probe(0x4000, 1).expect("resident");
    let block = cache.block_at(memsim_core::cache::BlockCoord { level: 1, set, way });
    assert!(block.in_upper_level);
}

#[test]
fn per_level_counters_track_the_walk() {
    let mut cache = two_level();
    let _ = cache.access(0x4000, MemOp::Write); // full miss: counted at both levels
    let _ = cache.access(0x4000, MemOp::Write); // L0 hit: counted at L0 only

    let l0 = cache.level_stats(0);
    let l1 = cache.level_stats(1);
    assert_eq!((l0.writes, l0.writes_hit, l0.writes_miss), (2, 1, 1));
    assert_eq!((l1.writes, l1.writes_hit, l1.writes_miss), (1, 0, 1));
}

// ══════════════════════════════════════════════════════════
// 2. Write-back emission
// ══════════════════════════════════════════════════════════

/// Filling a set with associativity+1 dirty lines emits exactly one
/// write-back, for the evicted-dirty block.
#[test]
fn dirty_eviction_emits_one_writeback() {
    let mut cache = single_level();
    // 2 ways, 2 sets, 64-byte blocks: 0x000, 0x100, 0x200 all land in set 0.
    let a = cache.access(0x000, MemOp::Write);
    let b = cache.access(0x100, MemOp::Write);
    assert_eq!(a.writeback, None, "invalid victims never write back");
    assert_eq!(b.writeback, None);

    let c = cache.access(0x200, MemOp::Write);
    assert_eq!(c.writeback, Some(0x000), "LRU dirty line written back");
    assert_eq!(cache.llc_evictions(), 3);
}

#[test]
fn clean_eviction_emits_no_writeback() {
    let mut cache = single_level();
    let _ = cache.access(0x000, MemOp::Read);
    let _ = cache.access(0x100, MemOp::Read);
    let c = cache.access(0x200, MemOp::Read);
    assert_eq!(c.writeback, None);
}

// ══════════════════════════════════════════════════════════
// 3. Inclusion bookkeeping across levels
// ══════════════════════════════════════════════════════════

/// An L0 conflict that is no conflict in L1: the access misses L0, hits L1,
/// and the L1 block's upper-level pin flips as the L0 copy comes and goes.
#[test]
fn lower_level_hit_promotes_and_repins() {
    let mut cache = two_level_l0_direct();
    let a = 0x000; // L0 set 0, L1 set 0
    let b = 0x080; // L0 set 0, L1 set 2

    let _ = cache.access(a, MemOp::Read);
    let pin = |cache: &CacheHierarchy, addr: u64| {
        let (set, way) = cache.probe(addr, 1).expect("resident in L1");
        cache
            .block_at(memsim_core::cache::BlockCoord { level: 1, set, way })
            .in_upper_level
    };
    assert!(pin(&cache, a));

    // B evicts A from the direct-mapped L0; A's L1 copy loses its pin.
    let _ = cache.access(b, MemOp::Read);
    assert!(!pin(&cache, a));
    assert!(pin(&cache, b));

    // A misses L0 but hits L1 and is promoted back up.
    let again = cache.access(a, MemOp::Read);
    assert!(again.hit);
    assert_eq!(again.level, Some(1));
    assert!(pin(&cache, a));
    assert!(!pin(&cache, b));
    cache.check_invariants();
}

/// Dirty state travels down when an upper copy is evicted.
#[test]
fn eviction_pushes_dirty_state_down() {
    let mut cache = two_level_l0_direct();
    let a = 0x000;
    let b = 0x080;

    let _ = cache.access(a, MemOp::Write);
    let _ = cache.access(b, MemOp::Read); // evicts A's L0 copy

    let (set, way) = cache.probe(a, 1).expect("A still resident in L1");
    let block = cache.block_at(memsim_core::cache::BlockCoord { level: 1, set, way });
    assert!(block.dirty, "dirty flag copied into the lower block");
    assert!(!block.in_upper_level);
}

/// Dirty state also travels up on promotion, so a later LLC eviction still
/// writes the line back.
#[test]
fn promotion_carries_dirty_state_up() {
    let mut cache = two_level_l0_direct();
    let a = 0x000;
    let b = 0x080;

    let _ = cache.access(a, MemOp::Write);
    let _ = cache.access(b, MemOp::Read); // A's dirty bit now lives in L1
    let again = cache.access(a, MemOp::Read); // L1 hit, promoted
    assert_eq!(again.level, Some(1));

    let (set, way) = cache.probe(a, 0).expect("promoted into L0");
    let block = cache.block_at(memsim_core::cache::BlockCoord { level: 0, set, way });
    assert!(block.dirty, "dirty flag follows the line upward");
}

// ══════════════════════════════════════════════════════════
// 4. Invariants under a mixed workload
// ══════════════════════════════════════════════════════════

#[test]
fn invariants_hold_under_mixed_workload() {
    let mut cache = two_level();
    // Small deterministic LCG over a footprint larger than the LLC.
    let mut x = 0x2545_f491u64;
    for i in 0..500 {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let addr = (x >> 16) & 0xfff_c0;
        let op = if i % 3 == 0 { MemOp::Write } else { MemOp::Read };
        let _ = cache.access(addr, op);
    }
    cache.check_invariants();
    let (hits, misses, total) = cache.totals();
    assert_eq!(hits + misses, total);
}

// ══════════════════════════════════════════════════════════
// 5. Construction validation
// ══════════════════════════════════════════════════════════

fn level(capacity: u64, ways: usize, block_size: u64) -> CacheLevelParams {
    CacheLevelParams {
        capacity,
        ways,
        block_size,
    }
}

#[test]
fn rejects_non_power_of_two_block_size() {
    let params = CacheParams {
        levels: vec![level(4096, 4, 48)],
        shared_llc: false,
    };
    assert!(CacheHierarchy::new(&params).is_err());
}

#[test]
fn rejects_indivisible_capacity() {
    let params = CacheParams {
        levels: vec![level(1000, 4, 64)],
        shared_llc: false,
    };
    assert!(CacheHierarchy::new(&params).is_err());
}

#[test]
fn rejects_mismatched_block_sizes() {
    let params = CacheParams {
        levels: vec![level(4096, 4, 64), level(16384, 8, 128)],
        shared_llc: false,
    };
    assert!(CacheHierarchy::new(&params).is_err());
}

#[test]
fn rejects_fully_pinnable_llc() {
    // L1 can pin 8 blocks of an L2 set that only has 8 ways.
    let params = CacheParams {
        levels: vec![level(4096, 8, 64), level(8192, 8, 64)],
        shared_llc: false,
    };
    assert!(CacheHierarchy::new(&params).is_err());
}

// ══════════════════════════════════════════════════════════
// 6. Address field law
// ══════════════════════════════════════════════════════════

proptest! {
    /// Decomposing then recomposing (tag, set, offset) reproduces the input
    /// address bit-exactly at every level.
    #[test]
    fn cache_fields_roundtrip(addr in any::<u64>()) {
        let cache = two_level();
        for lvl in 0..cache.level_count() {
            let (tag, set, offset) = cache.decompose(addr, lvl);
            prop_assert_eq!(cache.recompose(tag, set, offset, lvl), addr);
        }
    }
}
