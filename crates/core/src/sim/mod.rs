//! Simulation plumbing: clock domains, trace input, outputs, and the driver.

/// CPU/DRAM clock-domain crossing.
pub mod clock;
/// Run outputs (log, verification CSV).
pub mod output;
/// The top-level trace-driven driver.
pub mod simulator;
/// Trace file reader.
pub mod trace;

pub use clock::ClockDomainCrosser;
pub use output::SimOutput;
pub use simulator::{RunSummary, Simulator};
pub use trace::{TraceReader, TraceRecord};
