//! The memory controller: drives the bank table, command queue, transaction
//! queue, buses, refresh, low-power transitions, return-data matching, and
//! statistics/power accounting, in a fixed order every DRAM cycle.

use std::collections::{BTreeMap, VecDeque};
use std::io::Write;

use tracing::{debug, trace};

use crate::config::Config;
use crate::sim::output::{SimOutput, indexed_name};

use super::address::AddressMapping;
use super::bank::{BankStateKind, BankStateTable};
use super::bus::{BusPacket, BusPacketKind};
use super::channel::Callbacks;
use super::command_queue::CommandQueue;
use super::rank::Rank;
use super::transaction::{Transaction, TransactionKind};

/// Issue counters per command kind, reported in the final statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandCounters {
    /// READ commands issued.
    pub reads: u64,
    /// READ_P commands issued.
    pub reads_p: u64,
    /// WRITE commands issued.
    pub writes: u64,
    /// WRITE_P commands issued.
    pub writes_p: u64,
    /// ACTIVATE commands issued.
    pub activates: u64,
    /// PRECHARGE commands issued.
    pub precharges: u64,
    /// REFRESH commands issued.
    pub refreshes: u64,
}

/// One channel's memory controller.
#[derive(Debug)]
pub struct MemoryController {
    channel_id: usize,
    config: Config,
    mapping: AddressMapping,
    bank_states: BankStateTable,
    command_queue: CommandQueue,
    transaction_queue: Vec<Transaction>,
    pending_reads: Vec<Transaction>,
    returned_data: VecDeque<Transaction>,

    outgoing_cmd: Option<BusPacket>,
    cmd_cycles_left: u64,
    outgoing_data: Option<BusPacket>,
    data_cycles_left: u64,
    /// Write data awaiting its WL countdown before occupying the data bus.
    write_data: VecDeque<(BusPacket, u64)>,

    refresh_countdown: Vec<u64>,
    refresh_rank: usize,
    power_down: Vec<bool>,

    // Statistics. The per-bank/per-rank vectors are epoch-scoped; the grand
    // totals and the histogram run for the whole simulation.
    total_transactions: u64,
    reads_per_bank: Vec<u64>,
    writes_per_bank: Vec<u64>,
    epoch_latency: Vec<u64>,
    grand_total_bank_accesses: Vec<u64>,
    background_energy: Vec<u64>,
    burst_energy: Vec<u64>,
    actpre_energy: Vec<u64>,
    refresh_energy: Vec<u64>,
    latency_histogram: BTreeMap<u64, u64>,
    cmd_counters: CommandCounters,
}

impl MemoryController {
    /// Creates a controller for one channel.
    pub fn new(config: &Config, mapping: AddressMapping, channel_id: usize) -> Self {
        let num_ranks = config.system.num_ranks;
        let num_banks = config.device.num_banks;
        let refresh_cycles = config.timing.refresh_cycles;

        // Stagger the ranks' refresh deadlines across the interval.
        let refresh_countdown = (0..num_ranks)
            .map(|i| (refresh_cycles / num_ranks as u64) * (i as u64 + 1))
            .collect();

        Self {
            channel_id,
            bank_states: BankStateTable::new(config),
            command_queue: CommandQueue::new(config),
            transaction_queue: Vec::with_capacity(config.system.trans_queue_depth),
            pending_reads: Vec::new(),
            returned_data: VecDeque::new(),
            outgoing_cmd: None,
            cmd_cycles_left: 0,
            outgoing_data: None,
            data_cycles_left: 0,
            write_data: VecDeque::new(),
            refresh_countdown,
            refresh_rank: 0,
            power_down: vec![false; num_ranks],
            total_transactions: 0,
            reads_per_bank: vec![0; num_ranks * num_banks],
            writes_per_bank: vec![0; num_ranks * num_banks],
            epoch_latency: vec![0; num_ranks * num_banks],
            grand_total_bank_accesses: vec![0; num_ranks * num_banks],
            background_energy: vec![0; num_ranks],
            burst_energy: vec![0; num_ranks],
            actpre_energy: vec![0; num_ranks],
            refresh_energy: vec![0; num_ranks],
            latency_histogram: BTreeMap::new(),
            cmd_counters: CommandCounters::default(),
            mapping,
            config: config.clone(),
        }
    }

    #[inline]
    fn seq(&self, rank: usize, bank: usize) -> usize {
        rank * self.config.device.num_banks + bank
    }

    /// True when the transaction queue has room.
    pub fn will_accept_transaction(&self) -> bool {
        self.transaction_queue.len() < self.config.system.trans_queue_depth
    }

    /// Admits a transaction, stamping its admission cycle. Returns false
    /// when the queue is full (the channel buffers and retries).
    pub fn add_transaction(&mut self, mut trans: Transaction, now_cpu: u64) -> bool {
        if !self.will_accept_transaction() {
            return false;
        }
        trans.time_added = now_cpu;
        self.transaction_queue.push(trans);
        true
    }

    /// Accepts a DATA packet returned by a rank.
    pub fn receive_data(&mut self, packet: &BusPacket) {
        assert_eq!(
            packet.kind,
            BusPacketKind::Data,
            "controller received a non-DATA packet from a rank"
        );
        let mut trans = Transaction::new(TransactionKind::ReturnData, packet.addr, 0);
        trans.burst_len = packet.burst_len;
        self.returned_data.push_back(trans);
        let s = self.seq(packet.rank, packet.bank);
        self.reads_per_bank[s] += 1;
    }

    /// Reads still awaiting their return data.
    pub fn pending_read_count(&self) -> usize {
        self.pending_reads.len()
    }

    /// Transactions admitted but not yet decomposed into commands.
    pub fn queued_transaction_count(&self) -> usize {
        self.transaction_queue.len()
    }

    /// Executes one DRAM cycle of the controller pipeline.
    pub fn update(
        &mut self,
        ranks: &mut [Rank],
        callbacks: &mut Callbacks,
        output: &mut SimOutput,
        now_dram: u64,
        now_cpu: u64,
    ) {
        self.bank_states.decay(self.config.device.t_rp);
        self.advance_buses(ranks, callbacks, now_dram);
        self.drain_write_data();
        self.tick_refresh(ranks);
        self.dispatch_command(now_dram, output);
        self.schedule_transaction();
        self.return_read_data(callbacks, now_dram, now_cpu);
        self.account_power(ranks, now_dram);
        self.emit_epoch(callbacks, output, now_dram);
    }

    /// Step 2: move command/data packets along their buses and deliver them.
    fn advance_buses(&mut self, ranks: &mut [Rank], callbacks: &mut Callbacks, now_dram: u64) {
        if let Some(packet) = self.outgoing_cmd {
            self.cmd_cycles_left -= 1;
            if self.cmd_cycles_left == 0 {
                trace!(target: "memsim::bus", %packet, "command delivered");
                ranks[packet.rank].receive_from_bus(&packet);
                self.outgoing_cmd = None;
            }
        }

        if let Some(packet) = self.outgoing_data {
            self.data_cycles_left -= 1;
            if self.data_cycles_left == 0 {
                trace!(target: "memsim::bus", %packet, "write burst delivered");
                ranks[packet.rank].receive_from_bus(&packet);
                if let Some(cb) = callbacks.write_done.as_mut() {
                    cb(self.channel_id, packet.addr, now_dram);
                }
                self.outgoing_data = None;
            }
        }
    }

    /// Step 3: WL countdowns; an expired head claims the data bus.
    fn drain_write_data(&mut self) {
        for entry in &mut self.write_data {
            entry.1 -= 1;
        }
        if matches!(self.write_data.front(), Some(&(_, 0))) {
            let (packet, _) = self.write_data.pop_front().unwrap_or_else(|| unreachable!());
            assert!(
                self.outgoing_data.is_none(),
                "data bus collision at write burst for {packet}"
            );
            self.total_transactions += 1;
            let s = self.seq(packet.rank, packet.bank);
            self.writes_per_bank[s] += 1;
            self.outgoing_data = Some(packet);
            self.data_cycles_left = self.config.device.bl / 2;
        }
    }

    /// Step 4: refresh deadlines, round-robin across ranks.
    fn tick_refresh(&mut self, ranks: &mut [Rank]) {
        let cursor = self.refresh_rank;
        if self.refresh_countdown[cursor] == 0 {
            self.command_queue.needs_refresh(cursor);
            ranks[cursor].refresh_waiting = true;
            self.refresh_countdown[cursor] = self.config.timing.refresh_cycles;
            self.refresh_rank = (cursor + 1) % ranks.len();
        } else if self.power_down[cursor]
            && self.refresh_countdown[cursor] <= self.config.device.t_xp
        {
            // Wake a powered-down rank early enough to refresh on time.
            ranks[cursor].refresh_waiting = true;
        }
        for countdown in &mut self.refresh_countdown {
            *countdown = countdown.saturating_sub(1);
        }
    }

    /// Step 5: pop at most one command, stamp the bank table, claim the
    /// command bus, and account its energy.
    fn dispatch_command(&mut self, now_dram: u64, output: &mut SimOutput) {
        // The command bus is exclusive; while a packet is in flight nothing
        // else may issue.
        if self.outgoing_cmd.is_some() {
            return;
        }
        let Some(packet) = self.command_queue.pop(now_dram, &self.bank_states) else {
            return;
        };
        debug!(target: "memsim::cmd_queue", %packet, cycle = now_dram, "issuing");
        if self.config.system.verification_output {
            let _ = writeln!(output.log(), "{now_dram} {packet}");
        }

        let dev = &self.config.device;
        let timing = &self.config.timing;
        let rank = packet.rank;
        let len = packet.burst_len.max(1);

        if packet.kind.is_write() {
            let mut data = packet;
            data.kind = BusPacketKind::Data;
            self.write_data.push_back((data, timing.wl));
        }

        match packet.kind {
            BusPacketKind::Read | BusPacketKind::ReadP => {
                self.burst_energy[rank] += (dev.idd4r - dev.idd3n) * (dev.bl / 2) * len;
                if packet.kind == BusPacketKind::Read {
                    self.cmd_counters.reads += 1;
                } else {
                    self.cmd_counters.reads_p += 1;
                }
            }
            BusPacketKind::Write | BusPacketKind::WriteP => {
                self.burst_energy[rank] += (dev.idd4w - dev.idd3n) * (dev.bl / 2) * len;
                if packet.kind == BusPacketKind::Write {
                    self.cmd_counters.writes += 1;
                } else {
                    self.cmd_counters.writes_p += 1;
                }
            }
            BusPacketKind::Activate => {
                self.actpre_energy[rank] += (dev.idd0 * dev.t_rc)
                    .saturating_sub(dev.idd3n * dev.t_ras + dev.idd2n * (dev.t_rc - dev.t_ras))
                    * len;
                self.cmd_counters.activates += 1;
            }
            BusPacketKind::Precharge => {
                self.cmd_counters.precharges += 1;
            }
            BusPacketKind::Refresh => {
                self.refresh_energy[rank] +=
                    (dev.idd5 - dev.idd3n) * dev.t_rfc * timing.num_devices;
                self.cmd_counters.refreshes += 1;
            }
            BusPacketKind::Data => panic!("scheduler popped a DATA packet"),
        }

        self.bank_states
            .apply_command(&packet, now_dram, &self.config.device, &self.config.timing);

        assert!(
            self.outgoing_cmd.is_none(),
            "command bus collision at {packet}"
        );
        self.outgoing_cmd = Some(packet);
        self.cmd_cycles_left = self.config.device.t_cmd;
    }

    /// Step 6: decompose at most one admitted transaction into bus packets.
    fn schedule_transaction(&mut self) {
        for i in 0..self.transaction_queue.len() {
            let trans = self.transaction_queue[i];
            let decoded = self.mapping.decode(trans.addr);
            if !self
                .command_queue
                .has_room_for(2, decoded.rank, decoded.bank)
            {
                continue;
            }
            let trans = self.transaction_queue.remove(i);
            debug!(
                target: "memsim::addr_map",
                addr = %format_args!("{:#x}", trans.addr),
                channel = decoded.channel,
                rank = decoded.rank,
                bank = decoded.bank,
                row = decoded.row,
                column = decoded.column,
                "mapped transaction"
            );

            let activate = BusPacket {
                kind: BusPacketKind::Activate,
                rank: decoded.rank,
                bank: decoded.bank,
                row: decoded.row,
                column: decoded.column,
                addr: trans.addr,
                burst_len: trans.burst_len,
            };
            let column = BusPacket {
                kind: trans.column_command(self.config.system.row_buffer_policy),
                ..activate
            };
            self.command_queue.enqueue(activate);
            self.command_queue.enqueue(column);

            if trans.kind == TransactionKind::Read {
                self.pending_reads.push(trans);
            }
            // One transaction per cycle; scheduling more would need parallel
            // decode paths the hardware doesn't have.
            break;
        }
    }

    /// Step 7: match returned data against the oldest pending read.
    fn return_read_data(&mut self, callbacks: &mut Callbacks, now_dram: u64, now_cpu: u64) {
        let Some(ret) = self.returned_data.pop_front() else {
            return;
        };
        self.total_transactions += 1;

        let idx = self
            .pending_reads
            .iter()
            .position(|p| p.addr == ret.addr)
            .unwrap_or_else(|| {
                panic!("return data for {:#x} matches no pending read", ret.addr)
            });
        let pending = self.pending_reads.remove(idx);

        let decoded = self.mapping.decode(ret.addr);
        let latency = now_cpu.saturating_sub(pending.time_added);
        self.insert_histogram(latency, decoded.rank, decoded.bank);

        if let Some(cb) = callbacks.read_done.as_mut() {
            cb(self.channel_id, pending.addr, now_dram);
        }
    }

    /// Bins one read latency and accumulates the per-bank epoch total.
    fn insert_histogram(&mut self, latency: u64, rank: usize, bank: usize) {
        let s = self.seq(rank, bank);
        self.epoch_latency[s] += latency;
        let bin_size = self.config.system.histogram_bin_size.max(1);
        *self
            .latency_histogram
            .entry((latency / bin_size) * bin_size)
            .or_insert(0) += 1;
    }

    /// Step 8: background energy and the low-power state machine.
    fn account_power(&mut self, ranks: &mut [Rank], now_dram: u64) {
        let dev = &self.config.device;
        let num_banks = dev.num_banks;
        let num_devices = self.config.timing.num_devices;

        for r in 0..ranks.len() {
            if self.config.system.use_low_power {
                if self.command_queue.is_empty_rank(r) && !ranks[r].refresh_waiting {
                    if self.bank_states.all_idle(r) && !self.power_down[r] {
                        self.power_down[r] = true;
                        ranks[r].power_down();
                        for b in 0..num_banks {
                            let state = self.bank_states.get_mut(r, b);
                            state.state = BankStateKind::PowerDown;
                            state.next_power_up = now_dram + dev.t_cke;
                        }
                        debug!(target: "memsim::power", rank = r, "entering power-down");
                    }
                } else if self.power_down[r]
                    && now_dram >= self.bank_states.get(r, 0).next_power_up
                {
                    self.power_down[r] = false;
                    ranks[r].power_up();
                    for b in 0..num_banks {
                        let state = self.bank_states.get_mut(r, b);
                        state.state = BankStateKind::Idle;
                        state.next_activate = state.next_activate.max(now_dram + dev.t_xp);
                    }
                    debug!(target: "memsim::power", rank = r, "powering up");
                }
            }

            let bank_open = (0..num_banks).any(|b| {
                matches!(
                    self.bank_states.get(r, b).state,
                    BankStateKind::RowActive | BankStateKind::Refreshing
                )
            });
            self.background_energy[r] += if bank_open {
                dev.idd3n * num_devices
            } else if self.power_down[r] {
                dev.idd2p * num_devices
            } else {
                dev.idd2n * num_devices
            };
        }
    }

    /// Step 9: epoch boundary: emit and reset the epoch counters.
    fn emit_epoch(&mut self, callbacks: &mut Callbacks, output: &mut SimOutput, now_dram: u64) {
        let epoch = self.config.system.epoch_length;
        if epoch == 0 || now_dram == 0 || now_dram % epoch != 0 {
            return;
        }
        self.print_stats(false, callbacks, output, now_dram);

        let num_ranks = self.config.system.num_ranks;
        let num_banks = self.config.device.num_banks;
        self.total_transactions = 0;
        for r in 0..num_ranks {
            for b in 0..num_banks {
                let s = self.seq(r, b);
                self.reads_per_bank[s] = 0;
                self.writes_per_bank[s] = 0;
                self.epoch_latency[s] = 0;
            }
            self.burst_energy[r] = 0;
            self.actpre_energy[r] = 0;
            self.refresh_energy[r] = 0;
            self.background_energy[r] = 0;
        }
    }

    /// Writes the epoch (or final) statistics block to the log and CSV.
    pub fn print_stats(
        &mut self,
        final_stats: bool,
        callbacks: &mut Callbacks,
        output: &mut SimOutput,
        now_dram: u64,
    ) {
        let sys = &self.config.system;
        let dev = &self.config.device;
        let num_ranks = sys.num_ranks;
        let num_banks = dev.num_banks;

        let epoch = sys.epoch_length;
        let cycles_elapsed = if epoch == 0 {
            now_dram
        } else if now_dram % epoch == 0 {
            epoch
        } else {
            now_dram % epoch
        }
        .max(1);

        let bytes_per_transaction = sys.jedec_data_bus_bits * dev.bl / 8;
        let total_bytes = self.total_transactions * bytes_per_transaction;
        let seconds = cycles_elapsed as f64 * dev.tck * 1e-9;

        let mut bandwidth = vec![0.0f64; num_ranks * num_banks];
        let mut avg_latency = vec![0.0f64; num_ranks * num_banks];
        let mut reads_per_rank = vec![0u64; num_ranks];
        let mut writes_per_rank = vec![0u64; num_ranks];
        let mut total_bandwidth = 0.0;
        for r in 0..num_ranks {
            for b in 0..num_banks {
                let s = self.seq(r, b);
                bandwidth[s] = (self.reads_per_bank[s] + self.writes_per_bank[s]) as f64
                    * bytes_per_transaction as f64
                    / (1024.0 * 1024.0 * 1024.0)
                    / seconds;
                avg_latency[s] = if self.reads_per_bank[s] == 0 {
                    0.0
                } else {
                    self.epoch_latency[s] as f64 / self.reads_per_bank[s] as f64 * dev.tck
                };
                total_bandwidth += bandwidth[s];
                reads_per_rank[r] += self.reads_per_bank[s];
                writes_per_rank[r] += self.writes_per_bank[s];
                self.grand_total_bank_accesses[s] +=
                    self.reads_per_bank[s] + self.writes_per_bank[s];
            }
        }

        let log = output.log();
        let _ = writeln!(log, " =======================================================");
        let _ = writeln!(
            log,
            " ============== Printing Statistics [id:{}] ==============",
            self.channel_id
        );
        let _ = writeln!(
            log,
            "  == Total Return Transactions : {} ({} bytes) aggregate average bandwidth {:.3} GB/s",
            self.total_transactions, total_bytes, total_bandwidth
        );
        let _ = writeln!(
            log,
            "  == Pending Transactions : {} ({})",
            self.pending_reads.len(),
            now_dram
        );

        if sys.vis_file_output && self.channel_id == 0 {
            if let Some(csv) = output.csv() {
                csv.entry("ms".into(), format!("{:.6}", now_dram as f64 * dev.tck * 1e-6));
            }
        }

        let mean_latency = {
            let total: f64 = avg_latency.iter().sum();
            total / (num_ranks * num_banks) as f64
        };
        let total_column_cmds = self.cmd_counters.reads
            + self.cmd_counters.reads_p
            + self.cmd_counters.writes
            + self.cmd_counters.writes_p;

        for r in 0..num_ranks {
            let log = output.log();
            let _ = writeln!(log, "    -Rank   {r} :");
            let _ = writeln!(
                log,
                "        -Reads  : {} ({} bytes)",
                reads_per_rank[r],
                reads_per_rank[r] * bytes_per_transaction
            );
            let _ = writeln!(
                log,
                "        -Writes : {} ({} bytes)",
                writes_per_rank[r],
                writes_per_rank[r] * bytes_per_transaction
            );
            for b in 0..num_banks {
                let s = self.seq(r, b);
                let _ = writeln!(
                    log,
                    "      -Bandwidth / Latency  (Bank {b}): {:.3} GB/s\t{:.3} ns",
                    bandwidth[s], avg_latency[s]
                );
            }

            // Watts: energy integrates mA over cycles; scale by Vdd and the
            // mA→A factor.
            let cycles = cycles_elapsed as f64;
            let background_power =
                self.background_energy[r] as f64 / cycles * dev.vdd / 1000.0;
            let burst_power = self.burst_energy[r] as f64 / cycles * dev.vdd / 1000.0;
            let refresh_power = self.refresh_energy[r] as f64 / cycles * dev.vdd / 1000.0;
            let actpre_power = self.actpre_energy[r] as f64 / cycles * dev.vdd / 1000.0;
            let average_power = (self.background_energy[r]
                + self.burst_energy[r]
                + self.refresh_energy[r]
                + self.actpre_energy[r]) as f64
                / cycles
                * dev.vdd
                / 1000.0;
            // Remap-adjusted figures: the address-remap stage costs a fixed
            // energy per column access and a fixed latency per read.
            let average_power_remap = average_power
                + (writes_per_rank[r] + reads_per_rank[r]) as f64 * 2.940 / cycles;

            if let Some(cb) = callbacks.report_power.as_mut() {
                cb(background_power, burst_power, refresh_power, actpre_power);
            }

            let _ = writeln!(log, "  == Power Data for Rank           {r}");
            let _ = writeln!(log, "      -Average Power (watts)     : {average_power:.3}");
            let _ = writeln!(
                log,
                "      -Average Power w/ remap (watts) : {average_power_remap:.3}"
            );
            let _ = writeln!(log, "      -Background    (watts)     : {background_power:.3}");
            let _ = writeln!(log, "      -Act/Pre       (watts)     : {actpre_power:.3}");
            let _ = writeln!(log, "      -Burst         (watts)     : {burst_power:.3}");
            let _ = writeln!(log, "      -Refresh       (watts)     : {refresh_power:.3}");

            if sys.vis_file_output {
                if let Some(csv) = output.csv() {
                    let ch = self.channel_id;
                    csv.entry(indexed_name("Background_Power", &[ch, r]), format!("{background_power:.6}"));
                    csv.entry(indexed_name("ACT_PRE_Power", &[ch, r]), format!("{actpre_power:.6}"));
                    csv.entry(indexed_name("Burst_Power", &[ch, r]), format!("{burst_power:.6}"));
                    csv.entry(indexed_name("Refresh_Power", &[ch, r]), format!("{refresh_power:.6}"));
                    let mut rank_bandwidth = 0.0;
                    for b in 0..num_banks {
                        let s = self.seq(r, b);
                        csv.entry(indexed_name("Bandwidth", &[ch, r, b]), format!("{:.6}", bandwidth[s]));
                        csv.entry(indexed_name("Average_Latency", &[ch, r, b]), format!("{:.6}", avg_latency[s]));
                        rank_bandwidth += bandwidth[s];
                    }
                    csv.entry(indexed_name("Rank_Aggregate_Bandwidth", &[ch, r]), format!("{rank_bandwidth:.6}"));
                    csv.entry(
                        indexed_name("Rank_Average_Bandwidth", &[ch, r]),
                        format!("{:.6}", rank_bandwidth / num_ranks as f64),
                    );
                }
            }
        }

        let log = output.log();
        let _ = writeln!(
            log,
            "      -Total Average Latency       : {mean_latency:.3} ns"
        );
        let _ = writeln!(
            log,
            "      -Total Average Latency w/ remap : {:.3} ns",
            mean_latency + 68.0
        );
        if total_column_cmds > 0 {
            let _ = writeln!(
                log,
                "      -Workload character [(cycles*tCK)/(reads+writes)] : {:.3} ns",
                cycles_elapsed as f64 * dev.tck / total_column_cmds as f64
            );
        }

        if sys.vis_file_output {
            if let Some(csv) = output.csv() {
                let ch = self.channel_id;
                csv.entry(indexed_name("Aggregate_Bandwidth", &[ch]), format!("{total_bandwidth:.6}"));
                csv.entry(
                    indexed_name("Average_Bandwidth", &[ch]),
                    format!("{:.6}", total_bandwidth / (num_ranks * num_banks) as f64),
                );
                let _ = csv.finalize();
            }
        }

        if final_stats {
            self.print_final_block(output);
        }
        let _ = output.flush();
    }

    /// The end-of-simulation block: histogram, grand totals, command counts.
    fn print_final_block(&mut self, output: &mut SimOutput) {
        let bin = self.config.system.histogram_bin_size.max(1);
        let log = output.log();
        let _ = writeln!(log, " =======================================================");
        let _ = writeln!(log, "  ==  Final Statistics ==");
        let _ = writeln!(log, " ---  Latency list ({})", self.latency_histogram.len());
        let _ = writeln!(log, "    [lat] : #");
        for (&start, &count) in &self.latency_histogram {
            let _ = writeln!(log, "    [{}-{}] : {}", start, start + bin - 1, count);
        }

        let _ = writeln!(log, " --- Grand Total Bank usage list");
        for r in 0..self.config.system.num_ranks {
            let _ = writeln!(log, "  Rank {r}:");
            for b in 0..self.config.device.num_banks {
                let _ = writeln!(
                    log,
                    "    b{b}: {}",
                    self.grand_total_bank_accesses[self.seq(r, b)]
                );
            }
        }

        let c = &self.cmd_counters;
        let _ = writeln!(log, " --- DDR DRAM Command Statistics");
        let _ = writeln!(log, "    READ:{}", c.reads);
        let _ = writeln!(log, "    READ_P:{}", c.reads_p);
        let _ = writeln!(log, "    WRITE:{}", c.writes);
        let _ = writeln!(log, "    WRITE_P:{}", c.writes_p);
        let _ = writeln!(log, "    ACTIVATE:{}", c.activates);
        let _ = writeln!(log, "    PRECHARGE:{}", c.precharges);
        let _ = writeln!(log, "    REFRESH:{}", c.refreshes);

        if self.config.system.vis_file_output {
            if let Some(csv) = output.csv() {
                let _ = csv.raw_line("!!HISTOGRAM_DATA");
                for (&start, &count) in &self.latency_histogram {
                    let _ = csv.raw_line(&format!("{start}={count}"));
                }
            }
        }
    }

    /// Command-kind issue counters.
    pub fn command_counters(&self) -> &CommandCounters {
        &self.cmd_counters
    }

    /// Read access to the bank state table (tests, channel assertions).
    pub fn bank_states(&self) -> &BankStateTable {
        &self.bank_states
    }

    /// The latency histogram accumulated so far.
    pub fn latency_histogram(&self) -> &BTreeMap<u64, u64> {
        &self.latency_histogram
    }

    /// True when `rank` is powered down.
    pub fn is_powered_down(&self, rank: usize) -> bool {
        self.power_down[rank]
    }
}
