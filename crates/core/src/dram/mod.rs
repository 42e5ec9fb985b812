//! The DDRx DRAM channel model.
//!
//! This module implements a JEDEC-style memory channel behind the cache:
//! 1. **Address decomposition:** seven bit-interleaving schemes ([`address`]).
//! 2. **Bank state:** per-(rank, bank) timing bookkeeping ([`bank`]).
//! 3. **Queues:** bounded command queues with round-robin scheduling, row
//!    policies and refresh barriers ([`command_queue`]).
//! 4. **Ranks:** refresh/power-down flags and the read-return pipeline
//!    ([`rank`]).
//! 5. **Controller:** the fixed per-cycle pipeline driving everything
//!    ([`controller`]).
//! 6. **Channel:** the outward-facing wrapper with overflow buffering and
//!    completion callbacks ([`channel`]).

/// Physical-address decomposition schemes.
pub mod address;
/// Bank state and timing-constraint table.
pub mod bank;
/// Bus packets.
pub mod bus;
/// Channel wrapper and callbacks.
pub mod channel;
/// Command queue and scheduler.
pub mod command_queue;
/// Memory controller pipeline.
pub mod controller;
/// Rank model.
pub mod rank;
/// Logical transactions.
pub mod transaction;

pub use address::{AddressMapping, DecodedAddress};
pub use bank::{BankState, BankStateKind, BankStateTable};
pub use bus::{BusPacket, BusPacketKind};
pub use channel::{Callbacks, MemoryChannel};
pub use command_queue::CommandQueue;
pub use controller::{CommandCounters, MemoryController};
pub use rank::Rank;
pub use transaction::{Transaction, TransactionKind};
