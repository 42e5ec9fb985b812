//! Error definitions for the simulator.
//!
//! Two recoverable error families exist:
//! 1. **Configuration errors:** bad INI values, incoherent geometry, missing
//!    required keys. Fatal at startup with a diagnostic.
//! 2. **Trace errors:** an unreadable trace file. (Individual malformed trace
//!    records are logged and skipped, not surfaced as errors.)
//!
//! Internal invariant violations (bus collisions, orphan return data, a
//! corrupted recency order) are bugs, not runtime conditions; they panic with
//! a precise message instead of threading a `Result` through the hot path.

use thiserror::Error;

/// A configuration failure detected while loading or validating parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("cannot read config file `{path}`: {source}")]
    Io {
        /// Path of the file that failed to open.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line was not `KEY=VALUE` (after comment stripping).
    #[error("{file}:{line}: malformed entry `{text}` (expected KEY=VALUE)")]
    Malformed {
        /// File containing the bad line.
        file: String,
        /// 1-based line number.
        line: usize,
        /// The offending text.
        text: String,
    },

    /// A required numeric key was absent from both config files.
    #[error("missing required key `{0}`")]
    MissingKey(&'static str),

    /// A key was present but its value failed to parse or was out of range.
    #[error("invalid value `{value}` for key `{key}`: {reason}")]
    BadValue {
        /// The INI key.
        key: String,
        /// The rejected value text.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The parameters parsed individually but are incoherent together
    /// (non-power-of-two geometry, indivisible cache capacity, a fully
    /// pinnable LLC set, ...).
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A trace input failure.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be opened.
    #[error("cannot open trace file `{path}`: {source}")]
    Open {
        /// Path of the trace file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred while streaming trace records.
    #[error("error reading trace: {0}")]
    Read(#[from] std::io::Error),
}
