//! Simulator driver: owns the cache, the channel(s), the trace, and the two
//! clock domains.
//!
//! Each CPU tick consumes at most one trace record. The cache is queried
//! first; a hit ends the record's journey. A miss (and any dirty write-back
//! the fill evicted) is forwarded to the DRAM channel, a demand miss no
//! earlier than the CPU cycle stamped in the trace. The run ends when the
//! trace is exhausted and every forwarded transaction has completed, or at
//! the configured cycle cap.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::rc::Rc;

use tracing::info;

use crate::cache::{CacheHierarchy, MemOp};
use crate::common::error::ConfigError;
use crate::config::Config;
use crate::dram::address::AddressMapping;
use crate::dram::channel::{Callbacks, MemoryChannel};
use crate::dram::transaction::{Transaction, TransactionKind};
use crate::sim::clock::ClockDomainCrosser;
use crate::sim::output::SimOutput;
use crate::sim::trace::TraceReader;

/// Tracks transactions forwarded to the DRAM until their completions fire.
#[derive(Debug, Default)]
pub struct TransactionReceiver {
    pending_reads: HashMap<u64, VecDeque<u64>>,
    pending_writes: HashMap<u64, VecDeque<u64>>,
    outstanding: usize,
}

impl TransactionReceiver {
    /// Registers a forwarded transaction.
    pub fn add_pending(&mut self, kind: TransactionKind, addr: u64, cycle: u64) {
        match kind {
            TransactionKind::Read => {
                self.pending_reads.entry(addr).or_default().push_back(cycle);
            }
            TransactionKind::Write => {
                self.pending_writes.entry(addr).or_default().push_back(cycle);
            }
            TransactionKind::ReturnData => {
                panic!("return data is not an outbound transaction")
            }
        }
        self.outstanding += 1;
    }

    /// Matches a read completion; unmatched completions are fatal.
    pub fn read_complete(&mut self, addr: u64) {
        let queue = self
            .pending_reads
            .get_mut(&addr)
            .unwrap_or_else(|| panic!("read completion for {addr:#x} was never pending"));
        let _ = queue.pop_front();
        if queue.is_empty() {
            let _ = self.pending_reads.remove(&addr);
        }
        self.outstanding -= 1;
    }

    /// Matches a write completion; unmatched completions are fatal.
    pub fn write_complete(&mut self, addr: u64) {
        let queue = self
            .pending_writes
            .get_mut(&addr)
            .unwrap_or_else(|| panic!("write completion for {addr:#x} was never pending"));
        let _ = queue.pop_front();
        if queue.is_empty() {
            let _ = self.pending_writes.remove(&addr);
        }
        self.outstanding -= 1;
    }

    /// Transactions still in flight.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

/// End-of-run summary for callers (CLI printout, tests).
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// CPU cycles simulated.
    pub cpu_cycles: u64,
    /// DRAM cycles simulated on channel 0.
    pub dram_cycles: u64,
    /// Cache hits across all levels.
    pub cache_hits: u64,
    /// Full cache misses.
    pub cache_misses: u64,
    /// Total cache accesses.
    pub cache_accesses: u64,
    /// Transactions forwarded to the DRAM (demand misses + write-backs).
    pub dram_transactions: u64,
}

/// The top-level trace-driven simulator.
#[derive(Debug)]
pub struct Simulator {
    config: Config,
    cache: CacheHierarchy,
    channels: Vec<MemoryChannel>,
    mapping: AddressMapping,
    trace: TraceReader,
    crosser: ClockDomainCrosser,
    output: SimOutput,
    receiver: Rc<RefCell<TransactionReceiver>>,
    cpu_cycle: u64,
    /// A missed demand transaction waiting for its traced CPU cycle.
    held_miss: Option<Transaction>,
    trace_pending: bool,
    dram_transactions: u64,
}

impl Simulator {
    /// Builds the simulator and wires the completion callbacks.
    pub fn new(config: Config, trace: TraceReader, mut output: SimOutput) -> Result<Self, ConfigError> {
        let cache = CacheHierarchy::new(&config.cache)?;
        let mapping = AddressMapping::new(&config)?;
        let receiver = Rc::new(RefCell::new(TransactionReceiver::default()));

        let mut channels = Vec::with_capacity(config.system.num_chans);
        for id in 0..config.system.num_chans {
            let mut channel = MemoryChannel::new(&config, id)?;
            let read_rx = Rc::clone(&receiver);
            let write_rx = Rc::clone(&receiver);
            channel.register_callbacks(Callbacks {
                read_done: Some(Box::new(move |_chan, addr, _cycle| {
                    read_rx.borrow_mut().read_complete(addr);
                })),
                write_done: Some(Box::new(move |_chan, addr, _cycle| {
                    write_rx.borrow_mut().write_complete(addr);
                })),
                report_power: None,
            });
            channels.push(channel);
        }

        // Record the resolved parameters up front so any log is reproducible.
        let megs_per_rank = (config.device.num_rows as u64
            * config.device.num_cols as u64
            * config.device.device_width
            * config.device.num_banks as u64
            * config.timing.num_devices
            / 8)
            >> 20;
        let total_storage = megs_per_rank * config.system.num_ranks as u64;
        let _ = writeln!(
            output.log(),
            "memsim: {total_storage} MB/channel | {} rank(s) | {} device(s) per rank",
            config.system.num_ranks,
            config.timing.num_devices
        );
        let _ = writeln!(output.log(), "resolved configuration:\n{}", config.to_json());
        info!(%config, "simulator constructed");

        Ok(Self {
            cache,
            channels,
            mapping,
            trace,
            crosser: ClockDomainCrosser::new(1, 1),
            output,
            receiver,
            cpu_cycle: 0,
            held_miss: None,
            trace_pending: true,
            dram_transactions: 0,
            config,
        })
    }

    /// Sets the DRAM/CPU clock ratio (default 1:1).
    pub fn set_clock_ratio(&mut self, ratio: f64) {
        self.crosser = ClockDomainCrosser::from_ratio(ratio);
    }

    /// Runs to completion or to `cycle_cap` CPU cycles (0 = no cap).
    pub fn run(&mut self, cycle_cap: u64) -> RunSummary {
        while (cycle_cap == 0 || self.cpu_cycle < cycle_cap)
            && (self.trace_pending || self.receiver.borrow().outstanding() > 0)
        {
            self.tick();
        }
        self.finish()
    }

    /// Advances one CPU cycle (and the proportionate DRAM cycles).
    pub fn tick(&mut self) {
        self.cpu_update();

        let channels = &mut self.channels;
        let output = &mut self.output;
        let now_cpu = self.cpu_cycle;
        self.crosser.cpu_tick(|| {
            for channel in channels.iter_mut() {
                channel.update(output, now_cpu);
            }
        });

        self.cpu_cycle += 1;
    }

    /// The CPU-domain step: consume at most one trace record through the
    /// cache, and submit a held miss once its traced cycle arrives.
    fn cpu_update(&mut self) {
        if self.held_miss.is_none() && self.trace_pending {
            match self.trace.next_record() {
                None => self.trace_pending = false,
                Some(record) => {
                    let outcome = self.cache.access(record.addr, record.op);
                    if let Some(wb_addr) = outcome.writeback {
                        // Write-backs carry no traced deadline; they go out
                        // as ordinary writes immediately.
                        self.submit(TransactionKind::Write, wb_addr);
                    }
                    if !outcome.hit {
                        let kind = match record.op {
                            MemOp::Read => TransactionKind::Read,
                            MemOp::Write => TransactionKind::Write,
                        };
                        self.held_miss =
                            Some(Transaction::new(kind, record.addr, record.cycle));
                    }
                }
            }
        }

        if let Some(trans) = self.held_miss {
            if self.cpu_cycle >= trans.time_traced {
                self.submit(trans.kind, trans.addr);
                self.held_miss = None;
            }
        }
    }

    /// Routes a transaction to its channel and registers the pending record.
    fn submit(&mut self, kind: TransactionKind, addr: u64) {
        let chan = if self.channels.len() > 1 {
            self.mapping.decode(addr).channel % self.channels.len()
        } else {
            0
        };
        self.channels[chan].add_transaction(kind, addr, self.cpu_cycle);
        self.receiver
            .borrow_mut()
            .add_pending(kind, addr, self.cpu_cycle);
        self.dram_transactions += 1;
    }

    /// Emits the final statistics and builds the summary.
    fn finish(&mut self) -> RunSummary {
        let _ = self.cache.dump_statistics(self.output.log());
        for channel in &mut self.channels {
            channel.print_final_stats(&mut self.output);
        }
        let (hits, misses, total) = self.cache.totals();
        let _ = writeln!(
            self.output.log(),
            "\t hit_count: {hits}\t miss_count: {misses}\t transaction count: {}",
            self.dram_transactions
        );
        let _ = self.output.flush();

        RunSummary {
            cpu_cycles: self.cpu_cycle,
            dram_cycles: self.channels[0].dram_cycle(),
            cache_hits: hits,
            cache_misses: misses,
            cache_accesses: total,
            dram_transactions: self.dram_transactions,
        }
    }

    /// The cache hierarchy (tests inspect it directly).
    pub fn cache(&self) -> &CacheHierarchy {
        &self.cache
    }

    /// A channel by index.
    pub fn channel(&self, i: usize) -> &MemoryChannel {
        &self.channels[i]
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// CPU cycles elapsed so far.
    pub fn cpu_cycle(&self) -> u64 {
        self.cpu_cycle
    }
}
