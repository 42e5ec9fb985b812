//! Bank state table tests: timing update rules, issuability, decay, tFAW.
//!
//! Timing constants in play (DDR3-1333 test set): tRCD=10, tRC=34, tRAS=24,
//! tRRD=4, tRP=10, tCCD=4, BL/2=4, tRFC=74, tFAW=27, remap delay 4.

use pretty_assertions::assert_eq;

use memsim_core::dram::bank::{BankStateKind, BankStateTable};
use memsim_core::dram::bus::{BusPacket, BusPacketKind};

use crate::common::test_config;

fn packet(kind: BusPacketKind, rank: usize, bank: usize, row: u64) -> BusPacket {
    BusPacket {
        kind,
        rank,
        bank,
        row,
        column: 0,
        addr: 0,
        burst_len: 1,
    }
}

fn table() -> (BankStateTable, memsim_core::Config) {
    let config = test_config();
    (BankStateTable::new(&config), config)
}

#[test]
fn activate_opens_the_row_and_spaces_the_rank() {
    let (mut banks, config) = table();
    let act = packet(BusPacketKind::Activate, 0, 0, 42);
    assert!(banks.is_issuable(&act, 5));
    banks.apply_command(&act, 5, &config.device, &config.timing);

    let state = banks.get(0, 0);
    assert_eq!(state.state, BankStateKind::RowActive);
    assert_eq!(state.open_row, 42);
    assert_eq!(state.next_activate, 5 + 34); // tRC
    assert_eq!(state.next_precharge, 5 + 24); // tRAS
    assert_eq!(state.next_read, 5 + 10); // tRCD - AL
    assert_eq!(state.next_write, 5 + 10);

    // Same-rank siblings wait tRRD; the other rank is untouched.
    assert_eq!(banks.get(0, 1).next_activate, 5 + 4);
    assert_eq!(banks.get(1, 0).next_activate, 0);
}

#[test]
fn column_commands_require_the_open_row() {
    let (mut banks, config) = table();
    banks.apply_command(&packet(BusPacketKind::Activate, 0, 0, 42), 0, &config.device, &config.timing);

    let hit = packet(BusPacketKind::Read, 0, 0, 42);
    let conflict = packet(BusPacketKind::Read, 0, 0, 43);
    assert!(banks.is_issuable(&hit, 10));
    assert!(!banks.is_issuable(&hit, 9), "tRCD not yet satisfied");
    assert!(!banks.is_issuable(&conflict, 100), "row mismatch");
}

#[test]
fn read_spaces_subsequent_columns_by_tccd() {
    let (mut banks, config) = table();
    banks.apply_command(&packet(BusPacketKind::Activate, 0, 0, 42), 0, &config.device, &config.timing);
    banks.apply_command(&packet(BusPacketKind::Read, 0, 0, 42), 10, &config.device, &config.timing);

    // All banks of the rank wait max(tCCD, BL/2) = 4 for the next read.
    assert_eq!(banks.get(0, 0).next_read, 14);
    assert_eq!(banks.get(0, 3).next_read, 14);
    // The issuing bank's precharge waits the remap delay + read-to-pre.
    assert_eq!(banks.get(0, 0).next_precharge, 10 + 4 + 5);
}

#[test]
fn read_p_pins_column_bounds_until_the_autoprecharge() {
    let (mut banks, config) = table();
    banks.apply_command(&packet(BusPacketKind::Activate, 0, 0, 42), 0, &config.device, &config.timing);
    banks.apply_command(&packet(BusPacketKind::ReadP, 0, 0, 42), 10, &config.device, &config.timing);

    let state = banks.get(0, 0);
    // No further column command may land before the implicit precharge.
    assert_eq!(state.next_read, state.next_activate);
    assert_eq!(state.next_write, state.next_activate);
    assert_eq!(state.next_activate, 10 + 15); // READ_AUTOPRE: AL + tRTP + tRP
    assert_eq!(state.state_change_countdown, 5); // READ_TO_PRE
}

#[test]
fn read_p_decays_through_precharging_to_idle() {
    let (mut banks, config) = table();
    banks.apply_command(&packet(BusPacketKind::Activate, 0, 0, 42), 0, &config.device, &config.timing);
    banks.apply_command(&packet(BusPacketKind::ReadP, 0, 0, 42), 10, &config.device, &config.timing);

    // READ_TO_PRE = 5 cycles of RowActive, then tRP = 10 of Precharging.
    for _ in 0..5 {
        assert_eq!(banks.get(0, 0).state, BankStateKind::RowActive);
        banks.decay(config.device.t_rp);
    }
    assert_eq!(banks.get(0, 0).state, BankStateKind::Precharging);
    for _ in 0..10 {
        banks.decay(config.device.t_rp);
    }
    assert_eq!(banks.get(0, 0).state, BankStateKind::Idle);
}

#[test]
fn cross_rank_read_costs_rtrs_only_on_active_banks() {
    let (mut banks, config) = table();
    banks.apply_command(&packet(BusPacketKind::Activate, 0, 0, 42), 0, &config.device, &config.timing);
    banks.apply_command(&packet(BusPacketKind::Activate, 1, 0, 7), 4, &config.device, &config.timing);
    banks.apply_command(&packet(BusPacketKind::Read, 0, 0, 42), 14, &config.device, &config.timing);

    // Rank 1 bank 0 is RowActive: bus turnaround applies (BL/2 + tRTRS).
    assert_eq!(banks.get(1, 0).next_read, 14 + 4 + 1);
    // Rank 1 bank 1 is idle: untouched.
    assert_eq!(banks.get(1, 1).next_read, 0);
}

#[test]
fn refresh_blocks_the_whole_rank_for_trfc() {
    let (mut banks, config) = table();
    let refresh = packet(BusPacketKind::Refresh, 0, 0, 0);
    assert!(banks.is_issuable(&refresh, 3));
    banks.apply_command(&refresh, 3, &config.device, &config.timing);

    for b in 0..config.device.num_banks {
        let state = banks.get(0, b);
        assert_eq!(state.state, BankStateKind::Refreshing);
        assert_eq!(state.next_activate, 3 + 74);
    }

    // tRFC decay cycles later every bank is idle again.
    for _ in 0..74 {
        banks.decay(config.device.t_rp);
    }
    assert!(banks.all_idle(0));
}

#[test]
fn refresh_needs_all_banks_idle() {
    let (mut banks, config) = table();
    banks.apply_command(&packet(BusPacketKind::Activate, 0, 3, 1), 0, &config.device, &config.timing);
    assert!(!banks.is_issuable(&packet(BusPacketKind::Refresh, 0, 0, 0), 50));
}

#[test]
fn faw_window_caps_four_activates() {
    let (mut banks, config) = table();
    for (bank, t) in [(0usize, 0u64), (1, 4), (2, 8), (3, 12)] {
        banks.apply_command(&packet(BusPacketKind::Activate, 0, bank, 1), t, &config.device, &config.timing);
    }
    // The fifth ACTIVATE must wait until the first leaves the window.
    assert!(!banks.faw_allows(0, 26));
    assert!(banks.faw_allows(0, 27)); // t0 + tFAW
    // The other rank's window is independent.
    assert!(banks.faw_allows(1, 26));
}

#[test]
fn faw_gates_is_issuable_for_activates() {
    let (mut banks, config) = table();
    for (bank, t) in [(0usize, 0u64), (1, 4), (2, 8), (3, 12)] {
        banks.apply_command(&packet(BusPacketKind::Activate, 0, bank, 1), t, &config.device, &config.timing);
    }
    let fifth = packet(BusPacketKind::Activate, 0, 4, 1);
    assert!(!banks.is_issuable(&fifth, 26));
    assert!(banks.is_issuable(&fifth, 27));
}
