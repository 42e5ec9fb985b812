//! Rank model: refresh-pending flag, power-down state, and the read-return
//! pipeline.
//!
//! The rank receives command packets from the command bus after `tCMD`
//! cycles. A column read starts a countdown of `RL + BL/2`; when it expires
//! the rank puts a DATA packet back toward the controller, which matches it
//! against its pending reads. No payload bytes are modeled, only timing.

use std::collections::VecDeque;

use crate::config::Config;

use super::bus::{BusPacket, BusPacketKind};

/// One rank of the channel.
#[derive(Debug)]
pub struct Rank {
    /// Rank index within the channel.
    pub id: usize,
    /// Set by the controller when this rank's refresh interval elapses;
    /// cleared when the REFRESH command arrives on the command bus.
    pub refresh_waiting: bool,
    powered_down: bool,
    /// In-flight read returns: (future DATA packet, cycles until delivery).
    read_returns: VecDeque<(BusPacket, u64)>,
    /// Cycles from a READ landing on the rank to its data burst completing.
    return_delay: u64,
}

impl Rank {
    /// Creates an idle, powered-up rank.
    pub fn new(id: usize, config: &Config) -> Self {
        Self {
            id,
            refresh_waiting: false,
            powered_down: false,
            read_returns: VecDeque::new(),
            return_delay: config.timing.rl + config.device.bl / 2,
        }
    }

    /// True while the rank is in power-down.
    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    /// Enters power-down (controller bookkeeping lives in the bank table).
    pub fn power_down(&mut self) {
        self.powered_down = true;
    }

    /// Leaves power-down.
    pub fn power_up(&mut self) {
        self.powered_down = false;
    }

    /// Accepts a packet delivered by the command or data bus.
    pub fn receive_from_bus(&mut self, packet: &BusPacket) {
        match packet.kind {
            BusPacketKind::Read | BusPacketKind::ReadP => {
                let mut data = *packet;
                data.kind = BusPacketKind::Data;
                self.read_returns.push_back((data, self.return_delay));
            }
            BusPacketKind::Refresh => {
                self.refresh_waiting = false;
            }
            // Activates, writes, precharges and write data need no modeling
            // beyond the bank state table; the rank stores no payload.
            BusPacketKind::Activate
            | BusPacketKind::Write
            | BusPacketKind::WriteP
            | BusPacketKind::Precharge
            | BusPacketKind::Data => {}
        }
    }

    /// Advances one DRAM cycle; returns a DATA packet whose burst completed.
    pub fn update(&mut self) -> Option<BusPacket> {
        for entry in &mut self.read_returns {
            entry.1 -= 1;
        }
        if matches!(self.read_returns.front(), Some(&(_, 0))) {
            self.read_returns.pop_front().map(|(p, _)| p)
        } else {
            None
        }
    }

    /// Outstanding read returns (used by tests and teardown checks).
    pub fn outstanding_returns(&self) -> usize {
        self.read_returns.len()
    }
}
