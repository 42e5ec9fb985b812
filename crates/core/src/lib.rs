//! Cycle-accurate memory-hierarchy simulator library.
//!
//! This crate models a multi-level set-associative cache in front of a
//! JEDEC-style DDRx DRAM channel, driven by a trace of memory transactions:
//! 1. **Cache:** N-level inclusive write-back hierarchy with per-set LRU
//!    replacement and cross-level invalidation bookkeeping.
//! 2. **DRAM:** address decomposition, per-bank timing state, command and
//!    transaction queues, refresh scheduling, low-power transitions, and a
//!    return-data pipeline with power accounting.
//! 3. **Simulation:** a two-domain (CPU/DRAM) clock crossing, the trace
//!    reader, the statistics outputs, and the top-level driver.

/// Multi-level inclusive cache hierarchy.
pub mod cache;
/// Shared types, sentinels, and the error taxonomy.
pub mod common;
/// INI-driven configuration and derived timing.
pub mod config;
/// The DDRx DRAM channel model.
pub mod dram;
/// Driver, clocks, trace input, and outputs.
pub mod sim;

/// The immutable run configuration; load from INI files with `Config::load`.
pub use crate::config::Config;
/// The inclusive cache hierarchy.
pub use crate::cache::CacheHierarchy;
/// The outward-facing DRAM channel.
pub use crate::dram::MemoryChannel;
/// Top-level driver; owns the cache, channels, and clock domains.
pub use crate::sim::Simulator;
