//! Channel wrapper: owns the controller and the ranks, accepts external
//! transactions, buffers overflow, and routes completion callbacks.

use std::collections::VecDeque;

use crate::common::error::ConfigError;
use crate::config::Config;
use crate::sim::output::SimOutput;

use super::address::AddressMapping;
use super::controller::MemoryController;
use super::rank::Rank;
use super::transaction::{Transaction, TransactionKind};

/// Completion hook: (channel id, physical address, DRAM cycle).
pub type TransactionDoneFn = Box<dyn FnMut(usize, u64, u64)>;
/// Power report hook: (background, burst, refresh, act/pre) watts.
pub type PowerReportFn = Box<dyn FnMut(f64, f64, f64, f64)>;

/// The capability record of completion hooks held by the channel.
///
/// All three are optional and none of them re-enters the controller.
#[derive(Default)]
pub struct Callbacks {
    /// Fired when a read's data burst has returned and matched.
    pub read_done: Option<TransactionDoneFn>,
    /// Fired when a write's data burst has been delivered to its rank.
    pub write_done: Option<TransactionDoneFn>,
    /// Fired once per rank at every statistics emission.
    pub report_power: Option<PowerReportFn>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("read_done", &self.read_done.is_some())
            .field("write_done", &self.write_done.is_some())
            .field("report_power", &self.report_power.is_some())
            .finish()
    }
}

/// One memory channel: controller + ranks + overflow buffer.
#[derive(Debug)]
pub struct MemoryChannel {
    /// Channel index.
    pub id: usize,
    controller: MemoryController,
    ranks: Vec<Rank>,
    /// Unbounded overflow FIFO for transactions the controller rejected;
    /// retried one per DRAM tick.
    pending: VecDeque<Transaction>,
    callbacks: Callbacks,
    dram_cycle: u64,
}

impl MemoryChannel {
    /// Builds the channel, validating the address decomposition.
    pub fn new(config: &Config, id: usize) -> Result<Self, ConfigError> {
        let mapping = AddressMapping::new(config)?;
        let ranks = (0..config.system.num_ranks)
            .map(|i| Rank::new(i, config))
            .collect();
        Ok(Self {
            id,
            controller: MemoryController::new(config, mapping, id),
            ranks,
            pending: VecDeque::new(),
            callbacks: Callbacks::default(),
            dram_cycle: 0,
        })
    }

    /// Installs the completion hooks.
    pub fn register_callbacks(&mut self, callbacks: Callbacks) {
        self.callbacks = callbacks;
    }

    /// True when the controller can admit a transaction this cycle.
    pub fn will_accept_transaction(&self) -> bool {
        self.controller.will_accept_transaction()
    }

    /// Submits a transaction. Overflow lands in the channel buffer, so the
    /// submission itself always succeeds.
    pub fn add_transaction(&mut self, kind: TransactionKind, addr: u64, now_cpu: u64) {
        let trans = Transaction::new(kind, addr, now_cpu);
        if !self.controller.add_transaction(trans, now_cpu) {
            self.pending.push_back(trans);
        }
    }

    /// Advances the channel one DRAM cycle: ranks first, then one buffered
    /// retry, then the controller pipeline. The order is fixed.
    pub fn update(&mut self, output: &mut SimOutput, now_cpu: u64) {
        for rank in &mut self.ranks {
            if let Some(data) = rank.update() {
                self.controller.receive_data(&data);
            }
        }

        if !self.pending.is_empty() && self.controller.will_accept_transaction() {
            if let Some(trans) = self.pending.pop_front() {
                let _ = self.controller.add_transaction(trans, now_cpu);
            }
        }

        self.controller.update(
            &mut self.ranks,
            &mut self.callbacks,
            output,
            self.dram_cycle,
            now_cpu,
        );
        self.dram_cycle += 1;
    }

    /// Emits the final statistics block.
    pub fn print_final_stats(&mut self, output: &mut SimOutput) {
        let cycle = self.dram_cycle;
        self.controller
            .print_stats(true, &mut self.callbacks, output, cycle);
    }

    /// DRAM cycles elapsed on this channel.
    pub fn dram_cycle(&self) -> u64 {
        self.dram_cycle
    }

    /// Work still in flight: the overflow buffer, the transaction queue, and
    /// reads awaiting return data.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
            + self.controller.queued_transaction_count()
            + self.controller.pending_read_count()
    }

    /// The controller (tests inspect bank states and counters through it).
    pub fn controller(&self) -> &MemoryController {
        &self.controller
    }

    /// One rank (tests inspect refresh/power state).
    pub fn rank(&self, i: usize) -> &Rank {
        &self.ranks[i]
    }
}
