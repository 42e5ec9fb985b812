//! Controller pipeline scenarios, driven through the channel wrapper with a
//! 1:1 CPU/DRAM clock.

use std::cell::Cell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use memsim_core::dram::bank::BankStateKind;
use memsim_core::dram::channel::{Callbacks, MemoryChannel};
use memsim_core::dram::transaction::TransactionKind;
use memsim_core::sim::output::SimOutput;

use crate::common::config_with;

/// Ticks the channel until `predicate` holds, returning the DRAM cycle at
/// which it first did (or panicking after `limit` cycles).
fn run_until(
    channel: &mut MemoryChannel,
    output: &mut SimOutput,
    limit: u64,
    mut predicate: impl FnMut(&MemoryChannel) -> bool,
) -> u64 {
    for _ in 0..limit {
        let now = channel.dram_cycle();
        channel.update(output, now);
        if predicate(channel) {
            return channel.dram_cycle() - 1;
        }
    }
    panic!("condition not reached within {limit} DRAM cycles");
}

// ══════════════════════════════════════════════════════════
// 1. Row-hit pacing (open page)
// ══════════════════════════════════════════════════════════

/// Back-to-back reads to one open row: the first column command waits
/// tRCD−AL after the ACTIVATE; the second is spaced by max(tCCD, BL/2).
#[test]
fn back_to_back_reads_same_row_pace_at_tccd() {
    let config = config_with(&[
        ("ROW_BUFFER_POLICY", "open_page"),
        ("ADDRESS_MAPPING_SCHEME", "scheme4"),
    ]);
    let mut channel = MemoryChannel::new(&config, 0).expect("channel");
    let mut output = SimOutput::sink();

    channel.add_transaction(TransactionKind::Read, 0x10000, 0);
    channel.add_transaction(TransactionKind::Read, 0x10040, 0);

    let act_cycle = run_until(&mut channel, &mut output, 100, |c| {
        c.controller().command_counters().activates == 1
    });
    let first_read = run_until(&mut channel, &mut output, 100, |c| {
        c.controller().command_counters().reads == 1
    });
    let second_read = run_until(&mut channel, &mut output, 100, |c| {
        c.controller().command_counters().reads == 2
    });

    assert_eq!(first_read - act_cycle, 10, "tRCD − AL after the row opened");
    assert_eq!(second_read - first_read, 4, "max(tCCD, BL/2) row-hit pacing");
    // The second transaction's ACTIVATE was retired as stale.
    assert_eq!(channel.controller().command_counters().activates, 1);
    assert_eq!(channel.controller().command_counters().precharges, 0);
}

// ══════════════════════════════════════════════════════════
// 2. Read and write completion plumbing
// ══════════════════════════════════════════════════════════

#[test]
fn read_completion_fires_callback_and_bins_latency() {
    let config = config_with(&[("USE_LOW_POWER", "false")]);
    let mut channel = MemoryChannel::new(&config, 0).expect("channel");
    let mut output = SimOutput::sink();

    let reads_done = Rc::new(Cell::new(0u32));
    let hook = Rc::clone(&reads_done);
    channel.register_callbacks(Callbacks {
        read_done: Some(Box::new(move |_chan, _addr, _cycle| {
            hook.set(hook.get() + 1);
        })),
        write_done: None,
        report_power: None,
    });

    channel.add_transaction(TransactionKind::Read, 0x2000, 0);
    let done = run_until(&mut channel, &mut output, 200, |_| reads_done.get() == 1);

    // ACT at 1, READ_P at 11, delivered at 12, data after RL + BL/2 = 14.
    assert_eq!(done, 26);
    assert_eq!(channel.outstanding(), 0);
    let histogram = channel.controller().latency_histogram();
    assert_eq!(histogram.values().sum::<u64>(), 1);
    assert!(histogram.contains_key(&20), "26 CPU cycles bins at 20");
}

#[test]
fn write_completion_fires_after_the_data_burst() {
    let config = config_with(&[("USE_LOW_POWER", "false")]);
    let mut channel = MemoryChannel::new(&config, 0).expect("channel");
    let mut output = SimOutput::sink();

    let writes_done = Rc::new(Cell::new(0u32));
    let hook = Rc::clone(&writes_done);
    channel.register_callbacks(Callbacks {
        read_done: None,
        write_done: Some(Box::new(move |_chan, _addr, _cycle| {
            hook.set(hook.get() + 1);
        })),
        report_power: None,
    });

    channel.add_transaction(TransactionKind::Write, 0x2000, 0);
    // WRITE_P at 11, WL = 9 to claim the data bus, BL/2 = 4 on the bus.
    let done = run_until(&mut channel, &mut output, 200, |_| writes_done.get() == 1);
    assert_eq!(done, 24);
    assert_eq!(channel.controller().command_counters().writes_p, 1);
}

// ══════════════════════════════════════════════════════════
// 3. Low-power transitions
// ══════════════════════════════════════════════════════════

/// An idle rank powers down; new work waits at least tXP after power-up
/// before its ACTIVATE issues.
#[test]
fn idle_rank_powers_down_and_wakes_with_txp() {
    let config = config_with(&[("USE_LOW_POWER", "true")]);
    let mut channel = MemoryChannel::new(&config, 0).expect("channel");
    let mut output = SimOutput::sink();

    for _ in 0..10 {
        let now = channel.dram_cycle();
        channel.update(&mut output, now);
    }
    assert!(channel.controller().is_powered_down(0));
    assert!(channel.rank(0).is_powered_down());
    assert_eq!(
        channel.controller().bank_states().get(0, 0).state,
        BankStateKind::PowerDown
    );

    // Work arrives at cycle 10; the rank wakes the same cycle (tCKE has
    // passed) but the ACTIVATE must wait tXP = 4 after the wake.
    channel.add_transaction(TransactionKind::Read, 0x2000, 10);
    let wake = channel.dram_cycle();
    let act_cycle = run_until(&mut channel, &mut output, 100, |c| {
        c.controller().command_counters().activates == 1
    });
    assert!(!channel.controller().is_powered_down(0));
    assert!(
        act_cycle >= wake + config.device.t_xp,
        "ACTIVATE at {act_cycle}, power-up at {wake}"
    );
}

// ══════════════════════════════════════════════════════════
// 4. Refresh under an open row
// ══════════════════════════════════════════════════════════

/// Refresh arrives while a row is open: the scheduler precharges first,
/// then refreshes the whole rank, and no column command issues during tRFC.
#[test]
fn refresh_precharges_open_rows_first() {
    let config = config_with(&[
        ("ROW_BUFFER_POLICY", "open_page"),
        ("ADDRESS_MAPPING_SCHEME", "scheme4"),
        ("REFRESH_PERIOD", "150"), // 100 DRAM cycles; rank 0 due at 50
    ]);
    let mut channel = MemoryChannel::new(&config, 0).expect("channel");
    let mut output = SimOutput::sink();

    // Open a row on rank 0 and leave it open (open-page READ).
    channel.add_transaction(TransactionKind::Read, 0x10000, 0);
    let _ = run_until(&mut channel, &mut output, 50, |c| {
        c.controller().command_counters().reads == 1
    });

    let pre_cycle = run_until(&mut channel, &mut output, 100, |c| {
        c.controller().command_counters().precharges == 1
    });
    let refresh_cycle = run_until(&mut channel, &mut output, 100, |c| {
        c.controller().command_counters().refreshes == 1
    });
    assert!(pre_cycle >= 50, "precharge waits for the refresh deadline");
    assert!(refresh_cycle >= pre_cycle + config.device.t_rp);

    // All banks of rank 0 sit in Refreshing until tRFC elapses.
    assert_eq!(
        channel.controller().bank_states().get(0, 0).state,
        BankStateKind::Refreshing
    );
    let states = channel.controller().bank_states();
    for b in 0..config.device.num_banks {
        assert_eq!(states.get(0, b).next_activate, refresh_cycle + config.device.t_rfc);
    }

    // The refresh-waiting flag clears once the REFRESH lands on the rank.
    let now = channel.dram_cycle();
    channel.update(&mut output, now);
    assert!(!channel.rank(0).refresh_waiting);
}

// ══════════════════════════════════════════════════════════
// 5. Overflow buffering
// ══════════════════════════════════════════════════════════

#[test]
fn channel_buffers_transactions_past_the_queue_depth() {
    let config = config_with(&[("TRANS_QUEUE_DEPTH", "2"), ("USE_LOW_POWER", "false")]);
    let mut channel = MemoryChannel::new(&config, 0).expect("channel");
    let mut output = SimOutput::sink();

    for i in 0..5u64 {
        channel.add_transaction(TransactionKind::Read, 0x4000 + i * 0x40000, 0);
    }
    assert!(!channel.will_accept_transaction(), "controller queue is full");
    assert_eq!(channel.outstanding(), 5, "2 admitted + 3 buffered");

    // Everything drains eventually.
    let _ = run_until(&mut channel, &mut output, 2000, |c| c.outstanding() == 0);
}
