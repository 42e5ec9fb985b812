//! The per-rank (or per-rank-per-bank) command queue and its scheduler.
//!
//! `pop` scans candidate packets in round-robin order and returns the first
//! one the bank state table permits at the current cycle. The round-robin
//! cursor advances on every call, popped or not, so no queue starves. The
//! scheduler also owns the two row-buffer concerns that sit between the
//! transaction stream and the bank table: open-page row-hit promotion (with
//! the `TOTAL_ROW_ACCESSES` cap forcing an explicit PRECHARGE) and the
//! refresh barrier that drains a rank before its REFRESH may issue.

use std::collections::VecDeque;

use tracing::trace;

use crate::config::{Config, QueuingStructure, RowBufferPolicy, SchedulingPolicy};

use super::bank::{BankStateKind, BankStateTable};
use super::bus::{BusPacket, BusPacketKind};

/// Bounded command queue(s) for one channel.
#[derive(Debug)]
pub struct CommandQueue {
    /// One queue per rank, or per (rank, bank), per `structure`.
    queues: Vec<VecDeque<BusPacket>>,
    num_ranks: usize,
    num_banks: usize,
    depth: usize,
    structure: QueuingStructure,
    scheduling: SchedulingPolicy,
    row_policy: RowBufferPolicy,
    total_row_accesses: u64,
    /// Column accesses to the currently open row, per (rank, bank).
    row_access_counters: Vec<u64>,
    /// Ranks waiting for a refresh, in arrival order. The front rank is
    /// barriered: none of its other packets may pop.
    refresh_pending: VecDeque<usize>,
    next_rank: usize,
    next_bank: usize,
}

/// What the scan selected for issue.
enum Candidate {
    /// Packet at this position of this queue.
    Queued { queue: usize, pos: usize },
    /// A synthesized explicit PRECHARGE for (rank, bank).
    ForcedPrecharge { rank: usize, bank: usize },
}

impl CommandQueue {
    /// Creates the empty queue structure.
    pub fn new(config: &Config) -> Self {
        let num_ranks = config.system.num_ranks;
        let num_banks = config.device.num_banks;
        let queue_count = match config.system.queuing_structure {
            QueuingStructure::PerRank => num_ranks,
            QueuingStructure::PerRankPerBank => num_ranks * num_banks,
        };
        Self {
            queues: vec![VecDeque::new(); queue_count],
            num_ranks,
            num_banks,
            depth: config.system.cmd_queue_depth,
            structure: config.system.queuing_structure,
            scheduling: config.system.scheduling_policy,
            row_policy: config.system.row_buffer_policy,
            total_row_accesses: config.system.total_row_accesses,
            row_access_counters: vec![0; num_ranks * num_banks],
            refresh_pending: VecDeque::new(),
            next_rank: 0,
            next_bank: 0,
        }
    }

    #[inline]
    fn queue_index(&self, rank: usize, bank: usize) -> usize {
        match self.structure {
            QueuingStructure::PerRank => rank,
            QueuingStructure::PerRankPerBank => rank * self.num_banks + bank,
        }
    }

    #[inline]
    fn counter_index(&self, rank: usize, bank: usize) -> usize {
        rank * self.num_banks + bank
    }

    /// True when `extra` more packets fit in the queue serving (rank, bank).
    pub fn has_room_for(&self, extra: usize, rank: usize, bank: usize) -> bool {
        let q = &self.queues[self.queue_index(rank, bank)];
        q.len() + extra <= self.depth
    }

    /// Enqueues a packet; the caller must have checked `has_room_for`.
    pub fn enqueue(&mut self, packet: BusPacket) {
        let idx = self.queue_index(packet.rank, packet.bank);
        assert!(
            self.queues[idx].len() < self.depth,
            "command queue overflow for rank {} bank {}",
            packet.rank,
            packet.bank
        );
        self.queues[idx].push_back(packet);
    }

    /// True when no queue holds a packet for `rank`.
    pub fn is_empty_rank(&self, rank: usize) -> bool {
        match self.structure {
            QueuingStructure::PerRank => self.queues[rank].is_empty(),
            QueuingStructure::PerRankPerBank => (0..self.num_banks)
                .all(|b| self.queues[rank * self.num_banks + b].is_empty()),
        }
    }

    /// Installs the refresh barrier for `rank`, called by the controller
    /// when the rank's refresh interval elapses.
    pub fn needs_refresh(&mut self, rank: usize) {
        if !self.refresh_pending.contains(&rank) {
            self.refresh_pending.push_back(rank);
        }
    }

    /// Rank currently barriered for refresh, if any.
    pub fn refresh_rank(&self) -> Option<usize> {
        self.refresh_pending.front().copied()
    }

    /// Selects and removes at most one packet issuable at `now`.
    ///
    /// Refresh service takes priority: while a rank is barriered, its open
    /// banks are precharged as timing permits and the REFRESH itself is
    /// returned once every bank is idle; other ranks keep scheduling
    /// normally underneath the barrier.
    pub fn pop(&mut self, now: u64, banks: &BankStateTable) -> Option<BusPacket> {
        if let Some(packet) = self.service_refresh(now, banks) {
            self.advance_cursor();
            return Some(packet);
        }

        let refresh_blocked = self.refresh_rank();
        let positions = match self.structure {
            // One queue per rank, FIFO across its banks: scan each rank once.
            QueuingStructure::PerRank => self.num_ranks,
            QueuingStructure::PerRankPerBank => self.num_ranks * self.num_banks,
        };
        let mut selected = None;
        for offset in 0..positions {
            let (rank, bank) = match self.structure {
                QueuingStructure::PerRank => ((self.next_rank + offset) % self.num_ranks, 0),
                QueuingStructure::PerRankPerBank => self.scan_position(offset),
            };
            if Some(rank) == refresh_blocked {
                continue;
            }
            if let Some(candidate) = self.find_candidate(rank, bank, now, banks) {
                selected = Some(candidate);
                break;
            }
        }
        self.advance_cursor();

        match selected {
            None => None,
            Some(Candidate::ForcedPrecharge { rank, bank }) => {
                let idx = self.counter_index(rank, bank);
                self.row_access_counters[idx] = 0;
                trace!(target: "memsim::cmd_queue", rank, bank, "forced precharge (row access cap)");
                Some(BusPacket::rank_command(BusPacketKind::Precharge, rank, bank))
            }
            Some(Candidate::Queued { queue, pos }) => {
                let packet = self.queues[queue].remove(pos).unwrap_or_else(|| {
                    panic!("scheduler selected a vanished packet at {queue}:{pos}")
                });
                // A column command popped ahead of its own stale ACTIVATE
                // (the row was already open) retires that ACTIVATE with it.
                if packet.kind.is_column() && pos > 0 {
                    let stale = self.queues[queue][pos - 1];
                    if stale.kind == BusPacketKind::Activate && stale.addr == packet.addr {
                        let _ = self.queues[queue].remove(pos - 1);
                    }
                }
                let idx = self.counter_index(packet.rank, packet.bank);
                match packet.kind {
                    k if k.is_column() => self.row_access_counters[idx] += 1,
                    BusPacketKind::Activate => self.row_access_counters[idx] = 0,
                    _ => {}
                }
                Some(packet)
            }
        }
    }

    /// Drives the refresh barrier: PRECHARGE open banks, then REFRESH.
    fn service_refresh(&mut self, now: u64, banks: &BankStateTable) -> Option<BusPacket> {
        let rank = self.refresh_rank()?;

        let refresh = BusPacket::rank_command(BusPacketKind::Refresh, rank, 0);
        if banks.is_issuable(&refresh, now) {
            let _ = self.refresh_pending.pop_front();
            for b in 0..self.num_banks {
                let idx = self.counter_index(rank, b);
                self.row_access_counters[idx] = 0;
            }
            trace!(target: "memsim::cmd_queue", rank, "issuing REFRESH");
            return Some(refresh);
        }

        for bank in 0..self.num_banks {
            let state = banks.get(rank, bank);
            if state.state == BankStateKind::RowActive && now >= state.next_precharge {
                let idx = self.counter_index(rank, bank);
                self.row_access_counters[idx] = 0;
                trace!(target: "memsim::cmd_queue", rank, bank, "precharging ahead of REFRESH");
                return Some(BusPacket::rank_command(BusPacketKind::Precharge, rank, bank));
            }
        }
        None
    }

    /// (rank, bank) visited at `offset` steps past the cursor.
    fn scan_position(&self, offset: usize) -> (usize, usize) {
        let total = self.num_ranks * self.num_banks;
        match self.scheduling {
            SchedulingPolicy::RankThenBankRoundRobin => {
                let start = self.next_rank * self.num_banks + self.next_bank;
                let flat = (start + offset) % total;
                (flat / self.num_banks, flat % self.num_banks)
            }
            SchedulingPolicy::BankThenRankRoundRobin => {
                let start = self.next_bank * self.num_ranks + self.next_rank;
                let flat = (start + offset) % total;
                (flat % self.num_ranks, flat / self.num_ranks)
            }
        }
    }

    /// Advances the round-robin cursor one position (once per `pop`).
    fn advance_cursor(&mut self) {
        match self.scheduling {
            SchedulingPolicy::RankThenBankRoundRobin => {
                self.next_bank += 1;
                if self.next_bank == self.num_banks {
                    self.next_bank = 0;
                    self.next_rank = (self.next_rank + 1) % self.num_ranks;
                }
            }
            SchedulingPolicy::BankThenRankRoundRobin => {
                self.next_rank += 1;
                if self.next_rank == self.num_ranks {
                    self.next_rank = 0;
                    self.next_bank = (self.next_bank + 1) % self.num_banks;
                }
            }
        }
    }

    /// Finds an issuable packet for the queue serving (rank, bank).
    ///
    /// Per-bank order is always preserved: a packet may be selected past
    /// earlier packets only when none of them target its bank (relevant for
    /// `PerRank` queues, where one queue holds several banks). In open-page
    /// mode, column commands that hit the open row are preferred and may
    /// retire their stale leading ACTIVATE; a bank past its row-access cap is
    /// instead closed with a forced PRECHARGE.
    fn find_candidate(
        &self,
        rank: usize,
        bank: usize,
        now: u64,
        banks: &BankStateTable,
    ) -> Option<Candidate> {
        let qi = self.queue_index(rank, bank);
        let queue = &self.queues[qi];
        if queue.is_empty() {
            return None;
        }

        if self.row_policy == RowBufferPolicy::OpenPage {
            // Row hits first.
            'packets: for (pos, packet) in queue.iter().enumerate() {
                if !packet.kind.is_column() {
                    continue;
                }
                let state = banks.get(packet.rank, packet.bank);
                if state.state != BankStateKind::RowActive || state.open_row != packet.row {
                    continue;
                }
                if self.row_access_counters[self.counter_index(packet.rank, packet.bank)]
                    >= self.total_row_accesses
                {
                    continue;
                }
                if !banks.is_issuable(packet, now) {
                    continue;
                }
                for (prev_pos, prev) in queue.iter().enumerate().take(pos) {
                    if prev.rank == packet.rank && prev.bank == packet.bank {
                        let is_own_activate = prev_pos + 1 == pos
                            && prev.kind == BusPacketKind::Activate
                            && prev.addr == packet.addr;
                        if !is_own_activate {
                            continue 'packets;
                        }
                    }
                }
                return Some(Candidate::Queued { queue: qi, pos });
            }
        }

        // Head-of-line scan preserving per-bank order.
        'heads: for (pos, packet) in queue.iter().enumerate() {
            for prev in queue.iter().take(pos) {
                if prev.rank == packet.rank && prev.bank == packet.bank {
                    continue 'heads;
                }
            }
            if banks.is_issuable(packet, now) {
                return Some(Candidate::Queued { queue: qi, pos });
            }
            if self.row_policy == RowBufferPolicy::OpenPage
                && packet.kind == BusPacketKind::Activate
            {
                // The head wants a different row (or the cap closed this
                // one): close the bank when nothing still wants the open row.
                let state = banks.get(packet.rank, packet.bank);
                let capped = self.row_access_counters
                    [self.counter_index(packet.rank, packet.bank)]
                    >= self.total_row_accesses;
                if state.state == BankStateKind::RowActive
                    && now >= state.next_precharge
                    && (capped
                        || !self.queue_wants_open_row(qi, packet.rank, packet.bank, state.open_row))
                {
                    return Some(Candidate::ForcedPrecharge {
                        rank: packet.rank,
                        bank: packet.bank,
                    });
                }
            }
        }
        None
    }

    /// True when the queue still holds a column command for the open row of
    /// (rank, bank), in which case precharging would throw the row away.
    fn queue_wants_open_row(&self, qi: usize, rank: usize, bank: usize, row: u64) -> bool {
        self.queues[qi].iter().any(|p| {
            p.kind.is_column() && p.rank == rank && p.bank == bank && p.row == row
        })
    }
}
