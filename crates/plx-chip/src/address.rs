//! Register address encodings.
//!
//! The switch exposes one logical register identity, `(port, byte offset)`,
//! through two unrelated encodings:
//!
//! ```text
//! EEPROM stream address (16 bits, stored little-endian):
//!   15        10 9                  0
//!   ┌──────────┬────────────────────┐
//!   │ port [6] │ dword offset [10]  │
//!   └──────────┴────────────────────┘
//!
//! I2C command frame (4 bytes, sent in order):
//!   byte 0   opcode (0x04 read, 0x03 write)
//!   byte 1   port[4:1]
//!   byte 2   port[0] << 7 | offset[11:10]
//!   byte 3   offset[9:2]
//! ```
//!
//! The two are not interchangeable. Both drop the two low offset bits:
//! registers are dword-addressed, so an unaligned offset selects the dword
//! that contains it.

/// I2C command opcode: write a register.
pub const CMD_WRITE: u8 = 0b0000_0011;

/// I2C command opcode: read a register.
pub const CMD_READ: u8 = 0b0000_0100;

/// Highest port number representable in a stream address (6-bit field).
pub const STREAM_PORT_MAX: u8 = 0x3F;

/// Highest port number representable in an I2C command (5 bits split over two bytes).
pub const I2C_PORT_MAX: u8 = 0x1F;

/// Length of an I2C command frame in bytes.
pub const I2C_COMMAND_LEN: usize = 4;

/// Encode `(port, byte_offset)` as a 16-bit EEPROM stream register address.
///
/// Ports above [`STREAM_PORT_MAX`] are masked to six bits.
#[must_use]
pub const fn encode_stream_address(port: u8, byte_offset: u32) -> u16 {
    ((port as u16 & STREAM_PORT_MAX as u16) << 10) | ((byte_offset >> 2) & 0x3FF) as u16
}

/// Build a 4-byte I2C command frame for `opcode`.
///
/// Ports above [`I2C_PORT_MAX`] are masked to five bits.
#[must_use]
pub const fn encode_i2c_command(opcode: u8, port: u8, byte_offset: u32) -> [u8; I2C_COMMAND_LEN] {
    [
        opcode,
        (port >> 1) & 0xF,
        ((port & 0x1) << 7) | ((byte_offset >> 10) & 0x3) as u8,
        ((byte_offset >> 2) & 0xFF) as u8,
    ]
}

/// Build the I2C command frame that reads the register at `(port, byte_offset)`.
#[must_use]
pub const fn encode_i2c_read_command(port: u8, byte_offset: u32) -> [u8; I2C_COMMAND_LEN] {
    encode_i2c_command(CMD_READ, port, byte_offset)
}

/// Port selectors used in EEPROM stream addresses on the PEX8732 / PEX8734.
///
/// Ports are grouped into stations of four; the second station's ports
/// 4–7 are selected with codes 0x08–0x0B rather than their port number.
pub mod stream_port {
    /// Station 0, port 0.
    pub const PORT0: u8 = 0x00;
    /// Station 0, port 1.
    pub const PORT1: u8 = 0x01;
    /// Station 0, port 2.
    pub const PORT2: u8 = 0x02;
    /// Station 0, port 3.
    pub const PORT3: u8 = 0x03;
    /// Station 1, port 4.
    pub const PORT4: u8 = 0x08;
    /// Station 1, port 5.
    pub const PORT5: u8 = 0x09;
    /// Station 1, port 6.
    pub const PORT6: u8 = 0x0A;
    /// Station 1, port 7.
    pub const PORT7: u8 = 0x0B;
    /// A-LUT RAM 0..=3 base.
    pub const ALUT_RAM0: u8 = 0x2C;
    /// Virtual switch 0.
    pub const VS0: u8 = 0x30;
    /// Virtual switch 1.
    pub const VS1: u8 = 0x31;
    /// NT0 link interface.
    pub const NT0_LINK: u8 = 0x38;
    /// NT0 virtual interface.
    pub const NT0_VIRTUAL: u8 = 0x39;
    /// NT1 link interface.
    pub const NT1_LINK: u8 = 0x3A;
    /// NT1 virtual interface.
    pub const NT1_VIRTUAL: u8 = 0x3B;

    /// Map a physical port number 0..=7 to its stream selector.
    #[must_use]
    pub const fn station_port(port: u8) -> Option<u8> {
        match port {
            0..=3 => Some(port),
            4..=7 => Some(0x08 | (port - 4)),
            _ => None,
        }
    }

    /// A-LUT RAM bank selector, `bank` in 0..=3.
    #[must_use]
    pub const fn alut_ram(bank: u8) -> Option<u8> {
        if bank < 4 {
            Some(ALUT_RAM0 | bank)
        } else {
            None
        }
    }
}

/// Special I2C port numbers on the PEX8619.
pub mod i2c_port {
    /// NT port link interface.
    pub const NT_PORT_LINK: u8 = 0x10;
    /// NT P2P bridge.
    pub const NT_P2P_BRIDGE: u8 = 0x11;
    /// DMA function.
    pub const DMA: u8 = 0x12;
    /// DMA descriptor RAM.
    pub const DMA_DESCRIPTORS: u8 = 0x13;
}
