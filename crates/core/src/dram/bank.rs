//! Per-bank state and the timing-constraint bookkeeping table.
//!
//! Every (rank, bank) pair carries its current state, the open row, and the
//! earliest cycle at which each command kind may next be issued. The table
//! applies the JEDEC timing update rules when a command is dispatched and
//! answers `is_issuable` queries for the command-queue scheduler. All the
//! `next_*` bounds only ever move forward.

use std::collections::VecDeque;

use crate::config::{Config, DerivedTiming, DeviceParams};

use super::bus::{BusPacket, BusPacketKind};

/// Current state of one bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BankStateKind {
    /// No open row; ready for ACTIVATE.
    #[default]
    Idle,
    /// A row is open; column commands may issue.
    RowActive,
    /// Closing the open row; Idle after tRP.
    Precharging,
    /// Rank-wide refresh in progress; Idle after tRFC.
    Refreshing,
    /// Rank is powered down; Idle after power-up + tXP.
    PowerDown,
}

/// Timing and state record for one bank.
#[derive(Debug, Clone, Default)]
pub struct BankState {
    /// Current state.
    pub state: BankStateKind,
    /// Open row; meaningful only in `RowActive`.
    pub open_row: u64,
    /// Kind of the last command issued to this bank.
    pub last_command: Option<BusPacketKind>,
    /// Earliest cycle an ACTIVATE may issue.
    pub next_activate: u64,
    /// Earliest cycle a PRECHARGE may issue.
    pub next_precharge: u64,
    /// Earliest cycle a READ/READ_P may issue.
    pub next_read: u64,
    /// Earliest cycle a WRITE/WRITE_P may issue.
    pub next_write: u64,
    /// Earliest cycle a power-up may complete.
    pub next_power_up: u64,
    /// Cycles until an implicit state transition (auto-precharge completion,
    /// precharge settling, refresh completion); 0 when none is pending.
    pub state_change_countdown: u64,
}

impl BankState {
    /// Decrements the pending state-change countdown and applies the implied
    /// transition when it reaches zero.
    fn decay(&mut self, t_rp: u64) {
        if self.state_change_countdown == 0 {
            return;
        }
        self.state_change_countdown -= 1;
        if self.state_change_countdown > 0 {
            return;
        }
        match self.last_command {
            // Auto-precharge: the column burst has completed, the implied
            // PRECHARGE begins now.
            Some(BusPacketKind::ReadP | BusPacketKind::WriteP) => {
                self.state = BankStateKind::Precharging;
                self.last_command = Some(BusPacketKind::Precharge);
                self.state_change_countdown = t_rp;
            }
            Some(BusPacketKind::Refresh | BusPacketKind::Precharge) => {
                self.state = BankStateKind::Idle;
            }
            _ => {}
        }
    }
}

/// The full (rank x bank) state table plus per-rank ACTIVATE windows.
#[derive(Debug)]
pub struct BankStateTable {
    banks: Vec<BankState>,
    num_ranks: usize,
    num_banks: usize,
    /// Issue cycles of the last four ACTIVATEs per rank (tFAW window).
    activate_windows: Vec<VecDeque<u64>>,
    t_faw: u64,
}

impl BankStateTable {
    /// Creates an all-idle table.
    pub fn new(config: &Config) -> Self {
        let num_ranks = config.system.num_ranks;
        let num_banks = config.device.num_banks;
        Self {
            banks: vec![BankState::default(); num_ranks * num_banks],
            num_ranks,
            num_banks,
            activate_windows: vec![VecDeque::with_capacity(4); num_ranks],
            t_faw: config.device.t_faw,
        }
    }

    #[inline]
    fn index(&self, rank: usize, bank: usize) -> usize {
        rank * self.num_banks + bank
    }

    /// Immutable view of one bank.
    #[inline]
    pub fn get(&self, rank: usize, bank: usize) -> &BankState {
        &self.banks[self.index(rank, bank)]
    }

    /// Mutable view of one bank.
    #[inline]
    pub fn get_mut(&mut self, rank: usize, bank: usize) -> &mut BankState {
        let idx = self.index(rank, bank);
        &mut self.banks[idx]
    }

    /// Number of ranks covered.
    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// Number of banks per rank.
    pub fn num_banks(&self) -> usize {
        self.num_banks
    }

    /// Step 1 of the controller tick: decay every pending countdown.
    pub fn decay(&mut self, t_rp: u64) {
        for bank in &mut self.banks {
            bank.decay(t_rp);
        }
    }

    /// True when every bank of `rank` is idle.
    pub fn all_idle(&self, rank: usize) -> bool {
        (0..self.num_banks).all(|b| self.get(rank, b).state == BankStateKind::Idle)
    }

    /// True when issuing an ACTIVATE at `now` honors the four-ACTIVATE tFAW
    /// window for `rank`.
    pub fn faw_allows(&self, rank: usize, now: u64) -> bool {
        let window = &self.activate_windows[rank];
        window.len() < 4 || now >= window[0] + self.t_faw
    }

    /// Checks whether `packet` may be issued at `now`: the bank state must
    /// admit the command kind, the per-kind `next_*` bound must have passed,
    /// column commands must target the open row, and ACTIVATE must honor
    /// tFAW.
    pub fn is_issuable(&self, packet: &BusPacket, now: u64) -> bool {
        let bank = self.get(packet.rank, packet.bank);
        match packet.kind {
            BusPacketKind::Activate => {
                bank.state == BankStateKind::Idle
                    && now >= bank.next_activate
                    && self.faw_allows(packet.rank, now)
            }
            BusPacketKind::Read | BusPacketKind::ReadP => {
                bank.state == BankStateKind::RowActive
                    && now >= bank.next_read
                    && bank.open_row == packet.row
            }
            BusPacketKind::Write | BusPacketKind::WriteP => {
                bank.state == BankStateKind::RowActive
                    && now >= bank.next_write
                    && bank.open_row == packet.row
            }
            BusPacketKind::Precharge => {
                bank.state == BankStateKind::RowActive && now >= bank.next_precharge
            }
            BusPacketKind::Refresh => {
                (0..self.num_banks).all(|b| {
                    let bank = self.get(packet.rank, b);
                    bank.state == BankStateKind::Idle && now >= bank.next_activate
                })
            }
            BusPacketKind::Data => false,
        }
    }

    /// Applies the JEDEC timing update rules for a command issued at `now`.
    ///
    /// Callers must have verified [`Self::is_issuable`] first; violating a
    /// `next_*` bound here is an internal invariant failure.
    pub fn apply_command(
        &mut self,
        packet: &BusPacket,
        now: u64,
        dev: &DeviceParams,
        timing: &DerivedTiming,
    ) {
        let rank = packet.rank;
        let bank = packet.bank;
        let half_burst = dev.bl / 2;

        match packet.kind {
            BusPacketKind::Read | BusPacketKind::ReadP => {
                debug_assert!(now >= self.get(rank, bank).next_read, "tCCD/tRCD violated");
                {
                    let state = self.get_mut(rank, bank);
                    if packet.kind == BusPacketKind::ReadP {
                        // The burst completes, then the implied precharge runs;
                        // the row is gone once the countdown fires.
                        state.next_activate = state.next_activate.max(now + timing.read_autopre);
                        state.last_command = Some(BusPacketKind::ReadP);
                        state.state_change_countdown = timing.read_to_pre;
                    } else {
                        state.next_precharge = state
                            .next_precharge
                            .max(now + timing.remap_latency + timing.read_to_pre);
                        state.last_command = Some(BusPacketKind::Read);
                    }
                }

                for r in 0..self.num_ranks {
                    for b in 0..self.num_banks {
                        let other = self.get_mut(r, b);
                        if r == rank {
                            other.next_read =
                                other.next_read.max(now + dev.t_ccd.max(half_burst));
                            other.next_write = other.next_write.max(now + timing.read_to_write);
                        } else if other.state == BankStateKind::RowActive {
                            other.next_read =
                                other.next_read.max(now + half_burst + dev.t_rtrs);
                            other.next_write = other.next_write.max(now + timing.read_to_write);
                        }
                    }
                }

                if packet.kind == BusPacketKind::ReadP {
                    // Pin the column bounds to next_activate so no further
                    // column command lands before the auto-precharge state
                    // change is observed.
                    let state = self.get_mut(rank, bank);
                    state.next_read = state.next_activate;
                    state.next_write = state.next_activate;
                }
            }

            BusPacketKind::Write | BusPacketKind::WriteP => {
                debug_assert!(now >= self.get(rank, bank).next_write, "tCCD/tRCD violated");
                {
                    let state = self.get_mut(rank, bank);
                    if packet.kind == BusPacketKind::WriteP {
                        state.next_activate = state.next_activate.max(now + timing.write_autopre);
                        state.last_command = Some(BusPacketKind::WriteP);
                        state.state_change_countdown = timing.write_to_pre;
                    } else {
                        state.next_precharge = state
                            .next_precharge
                            .max(now + timing.remap_latency + timing.write_to_pre);
                        state.last_command = Some(BusPacketKind::Write);
                    }
                }

                for r in 0..self.num_ranks {
                    for b in 0..self.num_banks {
                        let other = self.get_mut(r, b);
                        if r == rank {
                            other.next_write =
                                other.next_write.max(now + dev.t_ccd.max(half_burst));
                            other.next_read =
                                other.next_read.max(now + timing.write_to_read_same);
                        } else if other.state == BankStateKind::RowActive {
                            other.next_write =
                                other.next_write.max(now + half_burst + dev.t_rtrs);
                            other.next_read =
                                other.next_read.max(now + timing.write_to_read_diff);
                        }
                    }
                }

                if packet.kind == BusPacketKind::WriteP {
                    let state = self.get_mut(rank, bank);
                    state.next_read = state.next_activate;
                    state.next_write = state.next_activate;
                }
            }

            BusPacketKind::Activate => {
                debug_assert!(now >= self.get(rank, bank).next_activate, "tRC/tRRD violated");
                {
                    let state = self.get_mut(rank, bank);
                    state.state = BankStateKind::RowActive;
                    state.last_command = Some(BusPacketKind::Activate);
                    state.open_row = packet.row;
                    state.next_activate = state.next_activate.max(now + dev.t_rc);
                    state.next_precharge = state.next_precharge.max(now + dev.t_ras);
                    // With posted CAS the column access may come earlier than
                    // the full tRCD.
                    let col_delay = dev.t_rcd.saturating_sub(dev.al);
                    state.next_read = state.next_read.max(now + col_delay);
                    state.next_write = state.next_write.max(now + col_delay);
                }

                for b in 0..self.num_banks {
                    if b != bank {
                        let other = self.get_mut(rank, b);
                        other.next_activate = other.next_activate.max(now + dev.t_rrd);
                    }
                }

                let window = &mut self.activate_windows[rank];
                window.push_back(now);
                if window.len() > 4 {
                    let _ = window.pop_front();
                }
            }

            BusPacketKind::Precharge => {
                let state = self.get_mut(rank, bank);
                debug_assert!(now >= state.next_precharge, "tRAS violated");
                state.state = BankStateKind::Precharging;
                state.last_command = Some(BusPacketKind::Precharge);
                state.state_change_countdown = dev.t_rp;
                state.next_activate = state.next_activate.max(now + dev.t_rp);
            }

            BusPacketKind::Refresh => {
                for b in 0..self.num_banks {
                    let state = self.get_mut(rank, b);
                    state.next_activate = now + dev.t_rfc;
                    state.state = BankStateKind::Refreshing;
                    state.last_command = Some(BusPacketKind::Refresh);
                    state.state_change_countdown = dev.t_rfc;
                }
            }

            BusPacketKind::Data => {
                panic!("DATA packets do not pass through the bank state table")
            }
        }
    }
}
