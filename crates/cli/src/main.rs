//! Memory-hierarchy simulator CLI.
//!
//! Runs a memory-transaction trace through the cache hierarchy and the DRAM
//! channel, writing a human-readable log and (optionally) a verification CSV
//! under `results/`.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use memsim_core::Config;
use memsim_core::sim::output::SimOutput;
use memsim_core::sim::simulator::Simulator;
use memsim_core::sim::trace::TraceReader;

#[derive(Parser, Debug)]
#[command(
    name = "memsim",
    author,
    version,
    about = "Cycle-accurate cache + DDRx DRAM simulator",
    long_about = "Feed a trace of memory transactions (<hex_addr> <P|R|W> <cpu_cycle> per line)\n\
                  through a multi-level inclusive cache and a JEDEC-style DRAM channel.\n\n\
                  Examples:\n  \
                  memsim traces/sample.trc\n  \
                  memsim traces/sample.trc -n 1000000 -c 4\n  \
                  memsim traces/sample.trc -o ROW_BUFFER_POLICY=open_page -o NUM_RANKS=4"
)]
struct Cli {
    /// Trace file to simulate.
    trace: PathBuf,

    /// Stop after this many CPU cycles (0 = run the whole trace).
    #[arg(short = 'n', long = "cycles", default_value_t = 0)]
    cycles: u64,

    /// Number of simulated cores (scales a shared last-level cache).
    #[arg(short = 'c', long = "cores", default_value_t = 1)]
    cores: usize,

    /// System INI file (controller, queues, policies).
    #[arg(short = 's', long = "system", default_value = "configs/system.ini")]
    system_ini: PathBuf,

    /// Device INI file (geometry, JEDEC timing, IDD currents).
    #[arg(short = 'd', long = "device", default_value = "configs/ddr3_1333.ini")]
    device_ini: PathBuf,

    /// KEY=VALUE override applied on top of the INI files (repeatable).
    #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Directory for the log and CSV outputs.
    #[arg(long = "results", default_value = "results")]
    results_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.system_ini, &cli.device_ini, &cli.overrides, cli.cores) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("memsim: configuration error: {e}");
            process::exit(1);
        }
    };

    let trace = match TraceReader::open(&cli.trace) {
        Ok(trace) => trace,
        Err(e) => {
            eprintln!("memsim: {e}");
            process::exit(1);
        }
    };

    let stem = cli
        .trace
        .file_stem()
        .map_or_else(|| "memsim".to_string(), |s| s.to_string_lossy().into_owned());
    let output = match SimOutput::to_files(
        Path::new(&cli.results_dir),
        &stem,
        config.system.vis_file_output,
    ) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("memsim: cannot create output files: {e}");
            process::exit(1);
        }
    };

    println!("memsim: {config}");
    println!(
        "  trace: {}  cycle cap: {}  cores: {}",
        cli.trace.display(),
        cli.cycles,
        cli.cores
    );

    let mut sim = match Simulator::new(config, trace, output) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("memsim: configuration error: {e}");
            process::exit(1);
        }
    };

    let summary = sim.run(cli.cycles);

    println!();
    println!(
        "[*] done: {} CPU cycles, {} DRAM cycles",
        summary.cpu_cycles, summary.dram_cycles
    );
    println!(
        "    cache: {} accesses, {} hits, {} misses ({:.2}% hit rate)",
        summary.cache_accesses,
        summary.cache_hits,
        summary.cache_misses,
        100.0 * summary.cache_hits as f64 / summary.cache_accesses.max(1) as f64
    );
    println!(
        "    dram: {} transactions forwarded (results in {}/{stem}.log)",
        summary.dram_transactions,
        cli.results_dir.display()
    );
}
