//! Logical memory transactions as admitted from the trace (or the cache's
//! write-back path).

use std::fmt;

use crate::config::RowBufferPolicy;

use super::bus::BusPacketKind;

/// Kind of a logical transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// A demand or write-back-originated read.
    Read,
    /// A demand or write-back write.
    Write,
    /// Data returning from a rank for an earlier read.
    ReturnData,
}

/// A logical request traveling through the transaction queue.
///
/// Reads leave a clone in the controller's pending list (keyed by address)
/// until the matching return data arrives; a write's lifetime ends when its
/// bus packets are enqueued.
#[derive(Debug, Clone, Copy)]
pub struct Transaction {
    /// Transaction kind.
    pub kind: TransactionKind,
    /// Physical address.
    pub addr: u64,
    /// Burst length in transaction units.
    pub burst_len: u64,
    /// CPU cycle at which the controller admitted the transaction
    /// (for latency accounting).
    pub time_added: u64,
    /// CPU cycle stamped in the trace; submission waits for it.
    pub time_traced: u64,
}

impl Transaction {
    /// Creates a demand transaction.
    pub fn new(kind: TransactionKind, addr: u64, time_traced: u64) -> Self {
        Self {
            kind,
            addr,
            burst_len: 1,
            time_added: 0,
            time_traced,
        }
    }

    /// The column command this transaction decomposes into, per row policy.
    pub fn column_command(&self, policy: RowBufferPolicy) -> BusPacketKind {
        match (self.kind, policy) {
            (TransactionKind::Read, RowBufferPolicy::OpenPage) => BusPacketKind::Read,
            (TransactionKind::Read, RowBufferPolicy::ClosePage) => BusPacketKind::ReadP,
            (TransactionKind::Write, RowBufferPolicy::OpenPage) => BusPacketKind::Write,
            (TransactionKind::Write, RowBufferPolicy::ClosePage) => BusPacketKind::WriteP,
            (TransactionKind::ReturnData, _) => {
                panic!("return data does not decompose into commands")
            }
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:#x} (traced {})", self.kind, self.addr, self.time_traced)
    }
}
