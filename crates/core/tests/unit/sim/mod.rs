//! Clock, trace, and whole-simulator tests.

/// Trace parsing.
pub mod trace;
