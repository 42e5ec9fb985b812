//! Cache component tests.

/// Hierarchy walk, inclusion, write-backs.
pub mod hierarchy;
