//! Configuration system for the memory-hierarchy simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize a run. It provides:
//! 1. **INI loading:** `KEY=VALUE` files with `;` comments, one for the
//!    system (controller/queues/policies) and one for the device (geometry,
//!    JEDEC timing, IDD currents).
//! 2. **Structures:** typed records for system, device, and cache-geometry
//!    parameters, plus timing values derived from the JEDEC parameters.
//! 3. **Enums:** row-buffer policy, scheduling policy, address-mapping
//!    scheme, and queuing structure.
//!
//! Missing-key semantics follow the INI contract: a missing numeric key is
//! fatal, a missing boolean defaults to `false`, a missing string defaults to
//! empty. Unknown keys emit a warning and are otherwise ignored. The resolved
//! `Config` is immutable after startup and is threaded through constructors;
//! there is no global mutable state. It is `Serialize` so the effective
//! parameters can be dumped as JSON into the run log.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::common::error::ConfigError;

/// Default cache geometry used when the system INI carries no cache keys.
///
/// Modeled on a desktop part: 3 levels, 64-byte lines, a shared last level.
mod defaults {
    /// Number of cache levels.
    pub const CACHE_LEVELS: usize = 3;

    /// Per-level capacity in bytes (L1, L2, L3).
    pub const CACHE_CAPACITY: [u64; 3] = [32 << 10, 256 << 10, 4 << 20];

    /// Per-level associativity (L1, L2, L3).
    pub const CACHE_WAYS: [usize; 3] = [4, 8, 16];

    /// Cache line size in bytes, uniform across levels.
    ///
    /// Matches the DRAM transaction granularity for a 64-bit bus at BL=8.
    pub const CACHE_BLOCK_SIZE: [u64; 3] = [64, 64, 64];

    /// Maximum supported cache depth.
    pub const MAX_CACHE_LEVELS: usize = 8;
}

/// Row-buffer management policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RowBufferPolicy {
    /// Keep rows open after a column access (bare READ/WRITE commands).
    OpenPage,
    /// Auto-precharge after every column access (READ_P/WRITE_P commands).
    #[default]
    ClosePage,
}

/// Command-queue scan order for the round-robin scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SchedulingPolicy {
    /// Exhaust a rank's banks before moving to the next rank.
    #[default]
    RankThenBankRoundRobin,
    /// Visit bank b of every rank before bank b+1.
    BankThenRankRoundRobin,
}

/// Physical-address bit interleaving over {channel, rank, bank, row, column}.
///
/// Each scheme is a pure bit-field permutation; see [`crate::dram::address`]
/// for the field orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[allow(missing_docs)]
pub enum AddressMappingScheme {
    Scheme1,
    #[default]
    Scheme2,
    Scheme3,
    Scheme4,
    Scheme5,
    Scheme6,
    Scheme7,
}

/// Shape of the command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum QueuingStructure {
    /// One queue per rank, FIFO across that rank's banks.
    PerRank,
    /// One queue per (rank, bank) pair, round-robin across banks.
    #[default]
    PerRankPerBank,
}

impl FromStr for RowBufferPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open_page" => Ok(Self::OpenPage),
            "close_page" => Ok(Self::ClosePage),
            _ => Err("expected open_page or close_page".into()),
        }
    }
}

impl FromStr for SchedulingPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rank_then_bank_round_robin" => Ok(Self::RankThenBankRoundRobin),
            "bank_then_rank_round_robin" => Ok(Self::BankThenRankRoundRobin),
            _ => Err("expected rank_then_bank_round_robin or bank_then_rank_round_robin".into()),
        }
    }
}

impl FromStr for AddressMappingScheme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheme1" => Ok(Self::Scheme1),
            "scheme2" => Ok(Self::Scheme2),
            "scheme3" => Ok(Self::Scheme3),
            "scheme4" => Ok(Self::Scheme4),
            "scheme5" => Ok(Self::Scheme5),
            "scheme6" => Ok(Self::Scheme6),
            "scheme7" => Ok(Self::Scheme7),
            _ => Err("expected scheme1..scheme7".into()),
        }
    }
}

impl FromStr for QueuingStructure {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_rank" => Ok(Self::PerRank),
            "per_rank_per_bank" => Ok(Self::PerRankPerBank),
            _ => Err("expected per_rank or per_rank_per_bank".into()),
        }
    }
}

/// Raw `KEY=VALUE` map accumulated from the INI files and CLI overrides.
///
/// Typed getters *remove* keys as they consume them so that whatever is left
/// at the end can be reported as unknown.
#[derive(Debug, Default)]
pub struct KeyMap {
    values: BTreeMap<String, String>,
}

impl KeyMap {
    /// Parses one INI file into this map, later files winning on duplicates.
    ///
    /// Lines are `KEY=VALUE`; everything after `;` is a comment; blank lines
    /// are ignored.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        for (idx, raw) in text.lines().enumerate() {
            let line = match raw.find(';') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Malformed {
                    file: path.display().to_string(),
                    line: idx + 1,
                    text: line.to_string(),
                });
            };
            let _ = self
                .values
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(())
    }

    /// Applies a `KEY=VALUE` command-line override on top of the file values.
    pub fn apply_override(&mut self, spec: &str) -> Result<(), ConfigError> {
        let Some((key, value)) = spec.split_once('=') else {
            return Err(ConfigError::Malformed {
                file: "<override>".into(),
                line: 0,
                text: spec.to_string(),
            });
        };
        let _ = self
            .values
            .insert(key.trim().to_string(), value.trim().to_string());
        Ok(())
    }

    /// Inserts a value directly (used by tests to build configs in memory).
    pub fn set(&mut self, key: &str, value: &str) {
        let _ = self.values.insert(key.to_string(), value.to_string());
    }

    fn take(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Required numeric key: absence is fatal.
    fn req_u64(&mut self, key: &'static str) -> Result<u64, ConfigError> {
        let value = self.take(key).ok_or(ConfigError::MissingKey(key))?;
        value.parse().map_err(|_| ConfigError::BadValue {
            key: key.into(),
            value,
            reason: "not an unsigned integer".into(),
        })
    }

    /// Required floating-point key (`tCK`, `Vdd`).
    fn req_f64(&mut self, key: &'static str) -> Result<f64, ConfigError> {
        let value = self.take(key).ok_or(ConfigError::MissingKey(key))?;
        value.parse().map_err(|_| ConfigError::BadValue {
            key: key.into(),
            value,
            reason: "not a number".into(),
        })
    }

    /// Optional numeric key with a default.
    fn opt_u64(&mut self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.take(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::BadValue {
                key: key.into(),
                value,
                reason: "not an unsigned integer".into(),
            }),
        }
    }

    /// Missing boolean defaults to false. Accepts `true`/`false` only.
    fn opt_bool(&mut self, key: &'static str) -> Result<bool, ConfigError> {
        match self.take(key).as_deref() {
            None => Ok(false),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(ConfigError::BadValue {
                key: key.into(),
                value: other.into(),
                reason: "not a boolean (expected true or false)".into(),
            }),
        }
    }

    /// Missing string defaults to empty; empty falls back to the enum default.
    fn opt_enum<T: FromStr<Err = String> + Default>(
        &mut self,
        key: &'static str,
    ) -> Result<T, ConfigError> {
        match self.take(key) {
            None => Ok(T::default()),
            Some(value) if value.is_empty() => Ok(T::default()),
            Some(value) => value.parse().map_err(|reason| ConfigError::BadValue {
                key: key.into(),
                value,
                reason,
            }),
        }
    }

    /// Warns once per key that was set but never consumed.
    pub fn warn_unused(&self) {
        for key in self.values.keys() {
            warn!(key = %key, "unknown configuration key ignored");
        }
    }
}

/// System-level parameters (controller, queues, policies, output gating).
#[derive(Debug, Clone, Serialize)]
pub struct SystemParams {
    /// Number of independent memory channels. Interleaving beyond one
    /// channel is not modeled; values above 1 only widen the decoder field.
    pub num_chans: usize,
    /// Ranks per channel.
    pub num_ranks: usize,
    /// Width of the JEDEC data bus in bits (64 for a standard rank).
    pub jedec_data_bus_bits: u64,
    /// Width of the data bus including ECC lanes (unused for storage math
    /// here; retained for config parity).
    pub ecc_data_bus_bits: u64,
    /// Transaction-queue depth.
    pub trans_queue_depth: usize,
    /// Per-queue command-queue depth.
    pub cmd_queue_depth: usize,
    /// DRAM cycles per statistics epoch (0 disables epochs).
    pub epoch_length: u64,
    /// Bin width of the read-latency histogram, in CPU cycles.
    pub histogram_bin_size: u64,
    /// Enables power-down of idle ranks.
    pub use_low_power: bool,
    /// Column accesses allowed to one open row before a forced precharge.
    pub total_row_accesses: u64,
    /// Row-buffer policy.
    pub row_buffer_policy: RowBufferPolicy,
    /// Command scheduling policy.
    pub scheduling_policy: SchedulingPolicy,
    /// Physical-address interleaving scheme.
    pub address_mapping_scheme: AddressMappingScheme,
    /// Command-queue shape.
    pub queuing_structure: QueuingStructure,
    /// Emit the per-epoch verification CSV.
    pub vis_file_output: bool,
    /// Emit the verification log block per epoch.
    pub verification_output: bool,
}

impl SystemParams {
    fn from_key_map(map: &mut KeyMap) -> Result<Self, ConfigError> {
        Ok(Self {
            num_chans: map.req_u64("NUM_CHANS")? as usize,
            num_ranks: map.req_u64("NUM_RANKS")? as usize,
            jedec_data_bus_bits: map.req_u64("JEDEC_DATA_BUS_BITS")?,
            ecc_data_bus_bits: map.opt_u64("ECC_DATA_BUS_BITS", 0)?,
            trans_queue_depth: map.req_u64("TRANS_QUEUE_DEPTH")? as usize,
            cmd_queue_depth: map.req_u64("CMD_QUEUE_DEPTH")? as usize,
            epoch_length: map.req_u64("EPOCH_LENGTH")?,
            histogram_bin_size: map.req_u64("HISTOGRAM_BIN_SIZE")?,
            use_low_power: map.opt_bool("USE_LOW_POWER")?,
            total_row_accesses: map.req_u64("TOTAL_ROW_ACCESSES")?,
            row_buffer_policy: map.opt_enum("ROW_BUFFER_POLICY")?,
            scheduling_policy: map.opt_enum("SCHEDULING_POLICY")?,
            address_mapping_scheme: map.opt_enum("ADDRESS_MAPPING_SCHEME")?,
            queuing_structure: map.opt_enum("QUEUING_STRUCTURE")?,
            vis_file_output: map.opt_bool("VIS_FILE_OUTPUT")?,
            verification_output: map.opt_bool("VERIFICATION_OUTPUT")?,
        })
    }
}

/// Device-level parameters: geometry, JEDEC timing (in DRAM cycles unless
/// noted), and IDD current draws (in mA).
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct DeviceParams {
    /// Banks per rank.
    pub num_banks: usize,
    /// Rows per bank.
    pub num_rows: usize,
    /// Columns per row.
    pub num_cols: usize,
    /// Data pins per device chip.
    pub device_width: u64,
    /// Refresh interval in nanoseconds (tREFI).
    pub refresh_period: u64,
    /// Clock period in nanoseconds.
    pub tck: f64,
    pub cl: u64,
    pub al: u64,
    /// Burst length in beats; a burst occupies `bl/2` data-bus cycles.
    pub bl: u64,
    pub t_ras: u64,
    pub t_rcd: u64,
    pub t_rrd: u64,
    pub t_rc: u64,
    pub t_rp: u64,
    pub t_ccd: u64,
    pub t_rtp: u64,
    pub t_wtr: u64,
    pub t_wr: u64,
    pub t_rtrs: u64,
    pub t_rfc: u64,
    pub t_faw: u64,
    pub t_cke: u64,
    pub t_xp: u64,
    pub t_cmd: u64,
    pub idd0: u64,
    pub idd1: u64,
    pub idd2p: u64,
    pub idd2q: u64,
    pub idd2n: u64,
    pub idd3pf: u64,
    pub idd3ps: u64,
    pub idd3n: u64,
    pub idd4w: u64,
    pub idd4r: u64,
    pub idd5: u64,
    pub idd6: u64,
    pub idd6l: u64,
    pub idd7: u64,
    /// Supply voltage in volts.
    pub vdd: f64,
}

impl DeviceParams {
    fn from_key_map(map: &mut KeyMap) -> Result<Self, ConfigError> {
        Ok(Self {
            num_banks: map.req_u64("NUM_BANKS")? as usize,
            num_rows: map.req_u64("NUM_ROWS")? as usize,
            num_cols: map.req_u64("NUM_COLS")? as usize,
            device_width: map.req_u64("DEVICE_WIDTH")?,
            refresh_period: map.req_u64("REFRESH_PERIOD")?,
            tck: map.req_f64("tCK")?,
            cl: map.req_u64("CL")?,
            al: map.req_u64("AL")?,
            bl: map.req_u64("BL")?,
            t_ras: map.req_u64("tRAS")?,
            t_rcd: map.req_u64("tRCD")?,
            t_rrd: map.req_u64("tRRD")?,
            t_rc: map.req_u64("tRC")?,
            t_rp: map.req_u64("tRP")?,
            t_ccd: map.req_u64("tCCD")?,
            t_rtp: map.req_u64("tRTP")?,
            t_wtr: map.req_u64("tWTR")?,
            t_wr: map.req_u64("tWR")?,
            t_rtrs: map.req_u64("tRTRS")?,
            t_rfc: map.req_u64("tRFC")?,
            t_faw: map.req_u64("tFAW")?,
            t_cke: map.req_u64("tCKE")?,
            t_xp: map.req_u64("tXP")?,
            t_cmd: map.req_u64("tCMD")?,
            idd0: map.req_u64("IDD0")?,
            idd1: map.req_u64("IDD1")?,
            idd2p: map.req_u64("IDD2P")?,
            idd2q: map.req_u64("IDD2Q")?,
            idd2n: map.req_u64("IDD2N")?,
            idd3pf: map.req_u64("IDD3Pf")?,
            idd3ps: map.req_u64("IDD3Ps")?,
            idd3n: map.req_u64("IDD3N")?,
            idd4w: map.req_u64("IDD4W")?,
            idd4r: map.req_u64("IDD4R")?,
            idd5: map.req_u64("IDD5")?,
            idd6: map.req_u64("IDD6")?,
            idd6l: map.req_u64("IDD6L")?,
            idd7: map.req_u64("IDD7")?,
            vdd: map.req_f64("Vdd")?,
        })
    }
}

/// Geometry of one cache level.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheLevelParams {
    /// Total capacity in bytes.
    pub capacity: u64,
    /// Associativity (blocks per set).
    pub ways: usize,
    /// Block size in bytes.
    pub block_size: u64,
}

/// Cache hierarchy geometry, level 0 being closest to the CPU.
#[derive(Debug, Clone, Serialize)]
pub struct CacheParams {
    /// Per-level geometry, `levels[0]` = L1.
    pub levels: Vec<CacheLevelParams>,
    /// The last level is shared across cores; its capacity is scaled by the
    /// core count (indexing only; it remains one table).
    pub shared_llc: bool,
}

impl CacheParams {
    fn from_key_map(map: &mut KeyMap, num_cores: usize) -> Result<Self, ConfigError> {
        let level_count = map.opt_u64("CACHE_LEVELS", defaults::CACHE_LEVELS as u64)? as usize;
        if level_count == 0 || level_count > defaults::MAX_CACHE_LEVELS {
            return Err(ConfigError::Invalid(format!(
                "CACHE_LEVELS must be between 1 and {}, got {level_count}",
                defaults::MAX_CACHE_LEVELS
            )));
        }

        // When the hierarchy is shallower than the default table, the last
        // configured level takes the LLC defaults.
        let default_idx = |i: usize| -> usize {
            if i + 1 == level_count {
                defaults::CACHE_LEVELS - 1
            } else {
                i.min(defaults::CACHE_LEVELS - 1)
            }
        };

        let shared_llc = match map.take("SHARED_LLC").as_deref() {
            None => true,
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(ConfigError::BadValue {
                    key: "SHARED_LLC".into(),
                    value: other.into(),
                    reason: "not a boolean (expected true or false)".into(),
                });
            }
        };

        let mut levels = Vec::with_capacity(level_count);
        for i in 0..level_count {
            let d = default_idx(i);
            let mut capacity = map.opt_u64(
                &format!("CACHE_L{i}_CAPACITY"),
                defaults::CACHE_CAPACITY[d],
            )?;
            let ways =
                map.opt_u64(&format!("CACHE_L{i}_WAYS"), defaults::CACHE_WAYS[d] as u64)? as usize;
            let block_size = map.opt_u64(
                &format!("CACHE_L{i}_BLOCK_SIZE"),
                defaults::CACHE_BLOCK_SIZE[d],
            )?;
            if shared_llc && i + 1 == level_count {
                capacity *= num_cores as u64;
            }
            levels.push(CacheLevelParams {
                capacity,
                ways,
                block_size,
            });
        }

        Ok(Self { levels, shared_llc })
    }
}

/// Timing values derived from the JEDEC parameters, in DRAM cycles.
///
/// These are fixed at load time so the controller never recomputes them on
/// the per-cycle path.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedTiming {
    /// Read latency, `CL + AL`.
    pub rl: u64,
    /// Write latency, `RL − 1`.
    pub wl: u64,
    /// READ to PRECHARGE on the same bank.
    pub read_to_pre: u64,
    /// WRITE to PRECHARGE on the same bank.
    pub write_to_pre: u64,
    /// READ_P issue to the earliest subsequent ACTIVATE.
    pub read_autopre: u64,
    /// WRITE_P issue to the earliest subsequent ACTIVATE.
    pub write_autopre: u64,
    /// READ to WRITE turnaround on the bus.
    pub read_to_write: u64,
    /// WRITE to READ, same rank.
    pub write_to_read_same: u64,
    /// WRITE to READ, different rank.
    pub write_to_read_diff: u64,
    /// Refresh interval in DRAM cycles, `REFRESH_PERIOD / tCK`.
    pub refresh_cycles: u64,
    /// Fixed address-remap pipeline delay added to `next_precharge` by bare
    /// READ/WRITE commands: 7 ns truncated to whole cycles.
    pub remap_latency: u64,
    /// DRAM chips per rank, `JEDEC_DATA_BUS_BITS / DEVICE_WIDTH`.
    pub num_devices: u64,
}

impl DerivedTiming {
    fn derive(dev: &DeviceParams, sys: &SystemParams) -> Result<Self, ConfigError> {
        if dev.tck <= 0.0 {
            return Err(ConfigError::Invalid("tCK must be positive".into()));
        }
        if dev.device_width == 0 || sys.jedec_data_bus_bits % dev.device_width != 0 {
            return Err(ConfigError::Invalid(format!(
                "JEDEC_DATA_BUS_BITS ({}) must be a multiple of DEVICE_WIDTH ({})",
                sys.jedec_data_bus_bits, dev.device_width
            )));
        }
        let rl = dev.cl + dev.al;
        let wl = rl.saturating_sub(1);
        let half_burst = dev.bl / 2;
        Ok(Self {
            rl,
            wl,
            read_to_pre: dev.al + half_burst + dev.t_rtp.max(dev.t_ccd) - dev.t_ccd,
            write_to_pre: wl + half_burst + dev.t_wr,
            read_autopre: dev.al + dev.t_rtp + dev.t_rp,
            write_autopre: wl + half_burst + dev.t_wr + dev.t_rp,
            read_to_write: rl + half_burst + dev.t_rtrs - wl,
            write_to_read_same: wl + half_burst + dev.t_wtr,
            write_to_read_diff: (wl + half_burst + dev.t_rtrs).saturating_sub(rl),
            refresh_cycles: (dev.refresh_period as f64 / dev.tck) as u64,
            remap_latency: (7.0 / dev.tck) as u64,
            num_devices: sys.jedec_data_bus_bits / dev.device_width,
        })
    }
}

/// The complete, immutable run configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// System parameters (system INI).
    pub system: SystemParams,
    /// Device parameters (device INI).
    pub device: DeviceParams,
    /// Cache hierarchy geometry.
    pub cache: CacheParams,
    /// Derived timing values.
    pub timing: DerivedTiming,
    /// Number of simulated cores (CLI `-c`; scales a shared LLC).
    pub num_cores: usize,
}

impl Config {
    /// Loads and validates the configuration from the two INI files plus
    /// `KEY=VALUE` overrides (applied last, highest precedence).
    pub fn load(
        system_ini: &Path,
        device_ini: &Path,
        overrides: &[String],
        num_cores: usize,
    ) -> Result<Self, ConfigError> {
        let mut map = KeyMap::default();
        map.load_file(device_ini)?;
        map.load_file(system_ini)?;
        for spec in overrides {
            map.apply_override(spec)?;
        }
        Self::from_key_map(map, num_cores)
    }

    /// Builds a configuration from an in-memory key map.
    pub fn from_key_map(mut map: KeyMap, num_cores: usize) -> Result<Self, ConfigError> {
        let num_cores = num_cores.max(1);
        let device = DeviceParams::from_key_map(&mut map)?;
        let system = SystemParams::from_key_map(&mut map)?;
        let cache = CacheParams::from_key_map(&mut map, num_cores)?;
        let timing = DerivedTiming::derive(&device, &system)?;
        map.warn_unused();

        let config = Self {
            system,
            device,
            cache,
            timing,
            num_cores,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        use crate::common::is_power_of_two;

        for (name, value) in [
            ("NUM_CHANS", self.system.num_chans as u64),
            ("NUM_RANKS", self.system.num_ranks as u64),
            ("NUM_BANKS", self.device.num_banks as u64),
            ("NUM_ROWS", self.device.num_rows as u64),
            ("NUM_COLS", self.device.num_cols as u64),
        ] {
            if !is_power_of_two(value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-zero power of two, got {value}"
                )));
            }
        }
        if self.system.trans_queue_depth == 0 || self.system.cmd_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "queue depths must be non-zero".into(),
            ));
        }
        if self.device.bl == 0 || self.device.bl % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "BL must be a non-zero even burst length, got {}",
                self.device.bl
            )));
        }
        Ok(())
    }

    /// Serializes the resolved configuration as pretty JSON for the run log.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("<config dump failed: {e}>"))
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rank(s) x {} bank(s), {:?}/{:?}, {} cache level(s)",
            self.system.num_ranks,
            self.device.num_banks,
            self.system.row_buffer_policy,
            self.system.queuing_structure,
            self.cache.levels.len()
        )
    }
}
