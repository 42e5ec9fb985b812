//! Trace-reader tests.

use std::io::Cursor;

use pretty_assertions::assert_eq;

use memsim_core::cache::MemOp;
use memsim_core::sim::trace::{TraceReader, TraceRecord};

fn reader(text: &str) -> TraceReader {
    TraceReader::from_reader(Cursor::new(text.to_string()), "<test>")
}

#[test]
fn parses_read_write_and_prefetch_records() {
    let mut trace = reader("1000 R 5\nfffff040 W 9\n2000 P 12\n");
    assert_eq!(
        trace.next_record(),
        Some(TraceRecord {
            addr: 0x1000,
            op: MemOp::Read,
            cycle: 5
        })
    );
    assert_eq!(
        trace.next_record(),
        Some(TraceRecord {
            addr: 0xfffff040,
            op: MemOp::Write,
            cycle: 9
        })
    );
    // Prefetches fold into reads.
    assert_eq!(
        trace.next_record(),
        Some(TraceRecord {
            addr: 0x2000,
            op: MemOp::Read,
            cycle: 12
        })
    );
    assert_eq!(trace.next_record(), None);
}

#[test]
fn tolerates_an_0x_prefix() {
    let mut trace = reader("0x1000 R 1\n");
    assert_eq!(trace.next_record().map(|r| r.addr), Some(0x1000));
}

#[test]
fn skips_blank_lines() {
    let mut trace = reader("\n\n1000 R 1\n\n2000 W 2\n");
    assert_eq!(trace.next_record().map(|r| r.addr), Some(0x1000));
    assert_eq!(trace.next_record().map(|r| r.addr), Some(0x2000));
    assert_eq!(trace.next_record(), None);
}

#[test]
fn skips_malformed_records() {
    let text = "zzzz R 1\n1000 X 2\n1000 R\n1000 R 3 extra\n2000 W 7\n";
    let mut trace = reader(text);
    // Only the last line is well-formed.
    assert_eq!(
        trace.next_record(),
        Some(TraceRecord {
            addr: 0x2000,
            op: MemOp::Write,
            cycle: 7
        })
    );
    assert_eq!(trace.next_record(), None);
}
