//! Run outputs: the human-readable log and the verification CSV.
//!
//! The CSV uses indexed column names (`Background_Power.0.1`,
//! `Bandwidth.0.1.3`, ...). The first finalized row writes the header line;
//! every epoch then appends one row of values. The final latency histogram is
//! appended after a `!!HISTOGRAM_DATA` marker line.

use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Builds an indexed column name like `Bandwidth.0.1.3`.
pub fn indexed_name(base: &str, indices: &[usize]) -> String {
    let mut name = String::from(base);
    for i in indices {
        name.push('.');
        name.push_str(&i.to_string());
    }
    name
}

/// Column-oriented CSV writer that learns its header from the first row.
pub struct CsvWriter {
    out: Box<dyn Write>,
    header: Vec<String>,
    row: Vec<String>,
    header_written: bool,
}

impl std::fmt::Debug for CsvWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvWriter")
            .field("columns", &self.header.len())
            .finish()
    }
}

impl CsvWriter {
    /// Wraps a writer.
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            header: Vec::new(),
            row: Vec::new(),
            header_written: false,
        }
    }

    /// Appends one named value to the current row.
    pub fn entry(&mut self, name: String, value: impl Display) {
        if !self.header_written {
            self.header.push(name);
        }
        self.row.push(value.to_string());
    }

    /// Ends the current row, emitting the header first if this is row one.
    pub fn finalize(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", self.header.join(","))?;
            self.header_written = true;
        }
        writeln!(self.out, "{}", self.row.join(","))?;
        self.row.clear();
        self.out.flush()
    }

    /// Writes a raw line (histogram marker and bins).
    pub fn raw_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }
}

/// The output sinks of one run.
pub struct SimOutput {
    log: Box<dyn Write>,
    csv: Option<CsvWriter>,
}

impl std::fmt::Debug for SimOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimOutput")
            .field("csv", &self.csv.is_some())
            .finish()
    }
}

impl SimOutput {
    /// Builds output sinks over arbitrary writers (tests capture buffers
    /// here).
    pub fn new(log: Box<dyn Write>, csv: Option<Box<dyn Write>>) -> Self {
        Self {
            log,
            csv: csv.map(CsvWriter::new),
        }
    }

    /// Creates `<dir>/<stem>.log` and (when `with_csv`) `<dir>/<stem>.vis.csv`.
    pub fn to_files(dir: &Path, stem: &str, with_csv: bool) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let log = BufWriter::new(File::create(dir.join(format!("{stem}.log")))?);
        let csv = if with_csv {
            let f = BufWriter::new(File::create(dir.join(format!("{stem}.vis.csv")))?);
            Some(Box::new(f) as Box<dyn Write>)
        } else {
            None
        };
        Ok(Self::new(Box::new(log), csv))
    }

    /// Output that discards everything (unit tests that don't read it).
    pub fn sink() -> Self {
        Self::new(Box::new(io::sink()), None)
    }

    /// The human-readable log sink.
    pub fn log(&mut self) -> &mut dyn Write {
        &mut *self.log
    }

    /// The verification CSV, when enabled.
    pub fn csv(&mut self) -> Option<&mut CsvWriter> {
        self.csv.as_mut()
    }

    /// Flushes both sinks.
    pub fn flush(&mut self) -> io::Result<()> {
        self.log.flush()
    }
}
