//! Line-oriented trace input.
//!
//! Each record is `<hex_address> <P|R|W> <cpu_cycle>`. `P` marks a prefetch
//! and is treated as a read. Addresses are textual hex without a `0x` prefix
//! (one is tolerated). Blank lines are ignored; malformed records are logged
//! and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::cache::MemOp;
use crate::common::error::TraceError;

/// One parsed trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    /// Physical address.
    pub addr: u64,
    /// Operation (prefetches fold into reads).
    pub op: MemOp,
    /// CPU cycle the record is stamped with.
    pub cycle: u64,
}

/// Streaming trace reader.
pub struct TraceReader {
    source: Box<dyn BufRead>,
    name: String,
    line_no: usize,
}

impl std::fmt::Debug for TraceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceReader")
            .field("name", &self.name)
            .field("line", &self.line_no)
            .finish()
    }
}

impl TraceReader {
    /// Opens a trace file.
    pub fn open(path: &Path) -> Result<Self, TraceError> {
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            source: Box::new(BufReader::new(file)),
            name: path.display().to_string(),
            line_no: 0,
        })
    }

    /// Wraps an in-memory reader (tests).
    pub fn from_reader(source: impl BufRead + 'static, name: &str) -> Self {
        Self {
            source: Box::new(source),
            name: name.to_string(),
            line_no: 0,
        }
    }

    /// Returns the next well-formed record, or `None` at end of input.
    pub fn next_record(&mut self) -> Option<TraceRecord> {
        loop {
            let mut line = String::new();
            match self.source.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!(trace = %self.name, error = %e, "trace read error, stopping");
                    return None;
                }
            }
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Self::parse(trimmed) {
                Some(record) => return Some(record),
                None => {
                    warn!(
                        trace = %self.name,
                        line = self.line_no,
                        text = trimmed,
                        "malformed trace record skipped"
                    );
                }
            }
        }
    }

    fn parse(line: &str) -> Option<TraceRecord> {
        let mut fields = line.split_whitespace();
        let addr_text = fields.next()?;
        let op_text = fields.next()?;
        let cycle_text = fields.next()?;
        if fields.next().is_some() {
            return None;
        }

        let addr = u64::from_str_radix(
            addr_text.strip_prefix("0x").unwrap_or(addr_text),
            16,
        )
        .ok()?;
        let op = match op_text {
            "R" | "P" => MemOp::Read,
            "W" => MemOp::Write,
            _ => return None,
        };
        let cycle = cycle_text.parse().ok()?;
        Some(TraceRecord { addr, op, cycle })
    }
}
