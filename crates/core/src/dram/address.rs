//! Physical-address decomposition for the DRAM channel.
//!
//! An address is split into {channel, rank, bank, row, column} fields by one
//! of seven bit-interleaving schemes. Every scheme is a pure bit-field
//! permutation, nothing beyond shifts and masks. The low bits (the byte
//! offset on the data bus plus the column bits covered by one burst) are
//! peeled first and are identical across schemes; the remaining fields are
//! then peeled LSB→MSB in the scheme's fixed order.

use crate::common::error::ConfigError;
use crate::common::{floor_log2, is_power_of_two};
use crate::config::{AddressMappingScheme, Config};

/// The five interleaved address fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Channel,
    Rank,
    Bank,
    Row,
    Column,
}

/// A decoded physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodedAddress {
    /// Channel index.
    pub channel: usize,
    /// Rank index within the channel.
    pub rank: usize,
    /// Bank index within the rank.
    pub bank: usize,
    /// Row index within the bank.
    pub row: u64,
    /// Column index at burst granularity (the in-burst column bits and the
    /// bus byte offset are not represented).
    pub column: u64,
}

/// Field peel order for each scheme, least-significant field first.
///
/// Reading a row right-to-left gives the conventional msb:...:lsb notation,
/// e.g. scheme 1 is `channel:rank:row:column:bank`.
static SCHEME_ORDERS: [[Field; 5]; 7] = [
    [Field::Bank, Field::Column, Field::Row, Field::Rank, Field::Channel],
    [Field::Rank, Field::Bank, Field::Column, Field::Row, Field::Channel],
    [Field::Row, Field::Column, Field::Bank, Field::Rank, Field::Channel],
    [Field::Column, Field::Row, Field::Bank, Field::Rank, Field::Channel],
    [Field::Bank, Field::Rank, Field::Column, Field::Row, Field::Channel],
    [Field::Column, Field::Rank, Field::Bank, Field::Row, Field::Channel],
    [Field::Channel, Field::Bank, Field::Rank, Field::Column, Field::Row],
];

/// Address decoder configured for one geometry and scheme.
#[derive(Debug, Clone)]
pub struct AddressMapping {
    scheme: AddressMappingScheme,
    chan_bits: u32,
    rank_bits: u32,
    bank_bits: u32,
    row_bits: u32,
    col_high_bits: u32,
    /// Column bits covered by one burst (below the decoded column field).
    col_low_bits: u32,
    /// Byte offset on the data bus (below the column bits entirely).
    byte_offset_bits: u32,
}

impl AddressMapping {
    /// Builds the decoder, validating that the configured geometry yields a
    /// coherent bit layout.
    ///
    /// # Errors
    ///
    /// Fails when a field width is not derived from a power of two (checked
    /// upstream but re-verified here), when the burst covers more column bits
    /// than exist, or when the fields overflow a 64-bit address.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let sys = &config.system;
        let dev = &config.device;

        let bus_bytes = sys.jedec_data_bus_bits / 8;
        let transaction_bytes = bus_bytes * dev.bl;
        for (name, v) in [
            ("JEDEC_DATA_BUS_BITS/8", bus_bytes),
            ("transaction size", transaction_bytes),
        ] {
            if !is_power_of_two(v) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a power of two, got {v}"
                )));
            }
        }

        let byte_offset_bits = floor_log2(bus_bytes);
        let col_low_bits = floor_log2(transaction_bytes) - byte_offset_bits;
        let col_bits = floor_log2(dev.num_cols as u64);
        if col_low_bits > col_bits {
            return Err(ConfigError::Invalid(format!(
                "one burst spans {col_low_bits} column bits but the device only has {col_bits}"
            )));
        }

        let mapping = Self {
            scheme: sys.address_mapping_scheme,
            chan_bits: floor_log2(sys.num_chans as u64),
            rank_bits: floor_log2(sys.num_ranks as u64),
            bank_bits: floor_log2(dev.num_banks as u64),
            row_bits: floor_log2(dev.num_rows as u64),
            col_high_bits: col_bits - col_low_bits,
            col_low_bits,
            byte_offset_bits,
        };
        if mapping.address_width() > 64 {
            return Err(ConfigError::Invalid(format!(
                "address fields need {} bits, which exceeds the 64-bit address",
                mapping.address_width()
            )));
        }
        Ok(mapping)
    }

    /// Total bits consumed by all fields including the burst offset.
    pub fn address_width(&self) -> u32 {
        self.chan_bits
            + self.rank_bits
            + self.bank_bits
            + self.row_bits
            + self.col_high_bits
            + self.col_low_bits
            + self.byte_offset_bits
    }

    fn order(&self) -> &'static [Field; 5] {
        let idx = match self.scheme {
            AddressMappingScheme::Scheme1 => 0,
            AddressMappingScheme::Scheme2 => 1,
            AddressMappingScheme::Scheme3 => 2,
            AddressMappingScheme::Scheme4 => 3,
            AddressMappingScheme::Scheme5 => 4,
            AddressMappingScheme::Scheme6 => 5,
            AddressMappingScheme::Scheme7 => 6,
        };
        &SCHEME_ORDERS[idx]
    }

    fn width(&self, field: Field) -> u32 {
        match field {
            Field::Channel => self.chan_bits,
            Field::Rank => self.rank_bits,
            Field::Bank => self.bank_bits,
            Field::Row => self.row_bits,
            Field::Column => self.col_high_bits,
        }
    }

    /// Decomposes a physical address.
    pub fn decode(&self, addr: u64) -> DecodedAddress {
        let mut rest = addr >> (self.byte_offset_bits + self.col_low_bits);
        let mut decoded = DecodedAddress::default();
        for &field in self.order() {
            let width = self.width(field);
            let value = rest & ((1u64 << width) - 1);
            rest >>= width;
            match field {
                Field::Channel => decoded.channel = value as usize,
                Field::Rank => decoded.rank = value as usize,
                Field::Bank => decoded.bank = value as usize,
                Field::Row => decoded.row = value,
                Field::Column => decoded.column = value,
            }
        }
        decoded
    }

    /// Inverse of [`Self::decode`]: rebuilds the (burst-aligned) address.
    ///
    /// Bits below the burst granularity are not represented in
    /// [`DecodedAddress`], so `encode(decode(a))` equals `a` with those bits
    /// cleared.
    pub fn encode(&self, decoded: &DecodedAddress) -> u64 {
        let mut addr = 0u64;
        let mut shift = self.byte_offset_bits + self.col_low_bits;
        for &field in self.order() {
            let width = self.width(field);
            let value = match field {
                Field::Channel => decoded.channel as u64,
                Field::Rank => decoded.rank as u64,
                Field::Bank => decoded.bank as u64,
                Field::Row => decoded.row,
                Field::Column => decoded.column,
            };
            addr |= value << shift;
            shift += width;
        }
        addr
    }

    /// Mask clearing the bits below burst granularity.
    pub fn burst_align_mask(&self) -> u64 {
        !((1u64 << (self.byte_offset_bits + self.col_low_bits)) - 1)
    }
}
