//! Serial EEPROM register stream
//!
//! The switch replays a list of register writes from its EEPROM at
//! power-up. [`EepromStreamBuilder`] collects those writes in playback order
//! and serializes them into the image the switch expects (see
//! `plx_chip::eeprom` for the layout).
//!
//! [`StreamConfig`] describes the board options the reference boards use
//! and expands them into entries.

use crate::error::{PlxError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use plx_chip::address::{encode_stream_address, stream_port, STREAM_PORT_MAX};
use plx_chip::eeprom::{self, CRC_DISABLED, ENTRY_LEN, MAX_ENTRIES, SIGNATURE};
use plx_chip::regs;
use tracing::debug;

/// One register write replayed at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterEntry {
    /// Stream port selector
    pub port: u8,
    /// Register byte offset (low two bits are ignored)
    pub byte_offset: u32,
    /// Value written
    pub value: u32,
}

impl RegisterEntry {
    /// Create an entry
    pub const fn new(port: u8, byte_offset: u32, value: u32) -> Self {
        Self {
            port,
            byte_offset,
            value,
        }
    }

    /// Encoded 16-bit stream address
    pub const fn address(&self) -> u16 {
        encode_stream_address(self.port, self.byte_offset)
    }

    /// Append the six on-image bytes to `buf`
    fn put(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.address());
        buf.put_u32_le(self.value);
    }
}

/// Ordered collection of register writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EepromStreamBuilder {
    entries: Vec<RegisterEntry>,
}

impl EepromStreamBuilder {
    /// Empty stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream for the options in `config`
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            entries: config.entries(),
        }
    }

    /// Append a register write
    ///
    /// `port` is the stream port selector as written to the image; use
    /// `plx_chip::address::stream_port` to name ports 4 and up.
    ///
    /// # Errors
    ///
    /// Returns `PortOutOfRange` if `port` does not fit the six-bit port field.
    pub fn append(&mut self, port: u8, byte_offset: u32, value: u32) -> Result<&mut Self> {
        if port > STREAM_PORT_MAX {
            return Err(PlxError::PortOutOfRange {
                port,
                max: STREAM_PORT_MAX,
            });
        }
        self.entries.push(RegisterEntry::new(port, byte_offset, value));
        Ok(self)
    }

    /// Entries in playback order
    pub fn entries(&self) -> &[RegisterEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries were appended
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the EEPROM image
    ///
    /// Output depends only on the entries, so repeated calls give the same
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns `EntryCountOverflow` if the entry byte count does not fit the
    /// 16-bit header field.
    pub fn serialize(&self) -> Result<Bytes> {
        let entries = self.entries.len();
        let byte_count = u16::try_from(entries * ENTRY_LEN)
            .map_err(|_| PlxError::EntryCountOverflow {
                entries,
                max: MAX_ENTRIES,
            })?;

        let mut buf = BytesMut::with_capacity(eeprom::image_len(entries));
        buf.put_u8(SIGNATURE);
        buf.put_u8(CRC_DISABLED);
        buf.put_u16_le(byte_count);
        for entry in &self.entries {
            entry.put(&mut buf);
        }
        // CRC checking is disabled, so the field stays zero.
        buf.put_u32_le(0);

        debug!("Serialized {entries} entries into {} byte image", buf.len());
        Ok(buf.freeze())
    }
}

/// Upstream / NT port role written to the upstream select register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamRole {
    /// Port 1 is upstream, both NT ports disabled
    UpstreamPort1,
    /// Port 0 upstream, NT0 on port 1
    NtPort1,
    /// Port 0 upstream, NT0 on port 4
    NtPort4,
}

/// NT port code that means "disabled"
const NT_PORT_DISABLED: u32 = 0x1A;
const NT0_ENABLE: u32 = 1 << 13;

impl UpstreamRole {
    /// Upstream select register value
    ///
    /// Upstream port in bits 0..=3, NT0 port in bits 8..=12 with its enable at
    /// bit 13, NT1 port in bits 16..=20 (always disabled here).
    pub const fn select_value(self) -> u32 {
        let nt1 = NT_PORT_DISABLED << 16;
        match self {
            Self::UpstreamPort1 => 0x1 | (NT_PORT_DISABLED << 8) | nt1,
            Self::NtPort1 => (0x1 << 8) | NT0_ENABLE | nt1,
            Self::NtPort4 => (0x4 << 8) | NT0_ENABLE | nt1,
        }
    }

    /// True for the NT roles
    pub const fn is_nt(self) -> bool {
        matches!(self, Self::NtPort1 | Self::NtPort4)
    }
}

/// Lane partitioning written to the port configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortConfigPreset {
    /// Two x8 ports
    X8x8,
    /// Four x4 ports
    X4x4x4x4,
}

impl PortConfigPreset {
    const X8X8: u32 = 0x2;
    const X8X4X4: u32 = 0x3;
    const X4X4X4X4: u32 = 0x4;

    /// Port configuration register value
    ///
    /// Station 0 code in bits 0..=2, station 1 fixed to x8x4x4 in bits 3..=5.
    pub const fn register_value(self) -> u32 {
        let station0 = match self {
            Self::X8x8 => Self::X8X8,
            Self::X4x4x4x4 => Self::X4X4X4X4,
        };
        station0 | (Self::X8X4X4 << 3)
    }
}

/// Board options for a PEX8732 / PEX8734 EEPROM image
///
/// | Option | Entries (stream port, offset, value) |
/// |--------|---------------------------------------|
/// | `station2_lane_reversal` | (port 4, 0x220, 0x4000_7100) |
/// | `disable_port1` | (0, 0x208, 0x2), (0, 0x30C, 0x0100_00FD) |
/// | `disable_port4` | (port 4, 0x208, 0x1), (0, 0x30C, 0x0100_00EF) |
/// | `upstream` | (0, 0x360, [`UpstreamRole::select_value`]) |
/// | `nt_interfaces` | (NT0 link, 0x04, 0x402), (NT0 virtual, 0x04, 0x402), NT roles only |
/// | `port_config` | (0, 0x300, [`PortConfigPreset::register_value`]) |
///
/// Entries are emitted in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct StreamConfig {
    /// Lane reversal and x4x4x8 configuration for station 1 (ports 4-7)
    pub station2_lane_reversal: bool,
    /// Disable port 1 and gate its clock
    pub disable_port1: bool,
    /// Disable port 4 RX termination and gate its clock
    pub disable_port4: bool,
    /// Upstream / NT role, or leave the strap default
    pub upstream: Option<UpstreamRole>,
    /// Enable memory access on the NT link and virtual interfaces
    pub nt_interfaces: bool,
    /// Lane partitioning, or leave the strap default
    pub port_config: Option<PortConfigPreset>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            station2_lane_reversal: true,
            disable_port1: false,
            disable_port4: false,
            upstream: Some(UpstreamRole::UpstreamPort1),
            nt_interfaces: false,
            port_config: Some(PortConfigPreset::X8x8),
        }
    }
}

/// Station control: lane reversal bits plus x4x4x8 enable (bit 30)
const STATION1_LANE_REVERSAL: u32 = (1 << 8) | (1 << 12) | (1 << 13) | (1 << 14) | (1 << 30);
/// NT interface command: memory access enable, INTx disable
const NT_INTERFACE_COMMAND: u32 = (1 << 1) | (1 << 10);

impl StreamConfig {
    /// Entries for these options, in playback order
    pub fn entries(&self) -> Vec<RegisterEntry> {
        let mut out = Vec::new();

        if self.station2_lane_reversal {
            out.push(RegisterEntry::new(
                stream_port::PORT4,
                regs::STATION_CONTROL,
                STATION1_LANE_REVERSAL,
            ));
        }
        if self.disable_port1 {
            out.push(RegisterEntry::new(stream_port::PORT0, regs::PORT_DISABLE, 1 << 1));
            out.push(RegisterEntry::new(
                stream_port::PORT0,
                regs::PORT_CLOCK_ENABLE,
                regs::PORT_CLOCK_ENABLE_POR & !(1 << 1),
            ));
        }
        if self.disable_port4 {
            out.push(RegisterEntry::new(stream_port::PORT4, regs::PORT_DISABLE, 1 << 0));
            out.push(RegisterEntry::new(
                stream_port::PORT0,
                regs::PORT_CLOCK_ENABLE,
                regs::PORT_CLOCK_ENABLE_POR & !(1 << 4),
            ));
        }
        if let Some(role) = self.upstream {
            out.push(RegisterEntry::new(
                stream_port::PORT0,
                regs::UPSTREAM_NT_SELECT,
                role.select_value(),
            ));
            if self.nt_interfaces && role.is_nt() {
                out.push(RegisterEntry::new(stream_port::NT0_LINK, regs::NT_COMMAND, NT_INTERFACE_COMMAND));
                out.push(RegisterEntry::new(
                    stream_port::NT0_VIRTUAL,
                    regs::NT_COMMAND,
                    NT_INTERFACE_COMMAND,
                ));
            }
        }
        if let Some(preset) = self.port_config {
            out.push(RegisterEntry::new(
                stream_port::PORT0,
                regs::PORT_CONFIGURATION,
                preset.register_value(),
            ));
        }

        out
    }

    /// File name the reference tooling gives this image
    pub fn image_name(&self) -> String {
        let mut name = String::from("plx8732");
        if self.station2_lane_reversal {
            name.push_str("_stn2rev");
        }
        match self.port_config {
            Some(PortConfigPreset::X4x4x4x4) => name.push_str("_x4x4x4x4"),
            Some(PortConfigPreset::X8x8) => name.push_str("_x8x8"),
            None => {}
        }
        if self.disable_port1 {
            name.push_str("_port1dis");
        }
        if self.disable_port4 {
            name.push_str("_port4dis");
        }
        match self.upstream {
            Some(UpstreamRole::NtPort1) => name.push_str("_port1NT"),
            Some(UpstreamRole::NtPort4) => name.push_str("_port4NT"),
            Some(UpstreamRole::UpstreamPort1) => name.push_str("_port1Upst"),
            None => {}
        }
        name.push_str(".bin");
        name
    }
}
