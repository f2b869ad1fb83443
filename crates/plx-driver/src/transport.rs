//! Transport abstraction for I2C adapters
//!
//! The core never drives the bus itself. Every register read and EEPROM
//! write goes through a [`Transport`], so the protocol layers run unchanged
//! against a USB host adapter, a Linux `i2c-dev` node, or the in-memory
//! [`MockTransport`](crate::backends::MockTransport) used in tests.

use crate::error::Result;
use std::fmt::Debug;

/// 7-bit I2C slave address of the switch (or EEPROM)
pub type DeviceAddress = u8;

/// Per-transfer I2C flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct I2cFlags(u8);

impl I2cFlags {
    /// Normal transfer: START … STOP
    pub const NONE: Self = Self(0);

    /// Omit the STOP condition so the next transfer continues the same
    /// bus transaction with a repeated START
    pub const NO_STOP: Self = Self(1 << 0);

    /// Raw flag bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for I2cFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Adapter function mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterMode {
    /// I2C only
    #[default]
    I2c,
    /// SPI and I2C both enabled (host-adapter default for this tooling)
    SpiI2c,
}

/// Reply to a [`Transport::read`]
///
/// `count` is the adapter's own report: the number of bytes clocked in,
/// or a negative adapter status code. `data` holds whatever was received.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadReply {
    /// Byte count or negative status
    pub count: i32,
    /// Received bytes
    pub data: Vec<u8>,
}

impl ReadReply {
    /// Successful reply carrying `data`
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let count = i32::try_from(data.len()).unwrap_or(i32::MAX);
        Self { count, data }
    }

    /// Reply with a bare status count and no data
    pub const fn status(count: i32) -> Self {
        Self {
            count,
            data: Vec::new(),
        }
    }
}

/// Byte-oriented I2C adapter
///
/// Lifecycle: `open` → `configure` → `set_bitrate` → `set_bus_timeout` →
/// any number of `write`/`read` → `close`. Implementations are used by one
/// caller at a time; methods take `&mut self`.
pub trait Transport: Debug {
    /// Open the adapter on `channel`
    ///
    /// # Errors
    ///
    /// Returns error if the adapter cannot be found or opened.
    fn open(channel: u32) -> Result<Self>
    where
        Self: Sized;

    /// Select the adapter function mode
    ///
    /// # Errors
    ///
    /// Returns error if the adapter rejects the mode.
    fn configure(&mut self, mode: AdapterMode) -> Result<()>;

    /// Set the bus bitrate, returning the rate actually applied (kHz)
    ///
    /// # Errors
    ///
    /// Returns error if the adapter rejects the request.
    fn set_bitrate(&mut self, khz: u32) -> Result<u32>;

    /// Set the bus-lock timeout, returning the timeout actually applied (ms)
    ///
    /// # Errors
    ///
    /// Returns error if the adapter rejects the request.
    fn set_bus_timeout(&mut self, ms: u32) -> Result<u32>;

    /// Write `bytes` to `device`, returning the number of bytes written
    ///
    /// # Errors
    ///
    /// Returns error on adapter or bus failure.
    fn write(&mut self, device: DeviceAddress, flags: I2cFlags, bytes: &[u8]) -> Result<usize>;

    /// Read up to `count` bytes from `device`
    ///
    /// # Errors
    ///
    /// Returns error on adapter failure. A NAK or short transfer is
    /// reported through [`ReadReply::count`], not as an error.
    fn read(&mut self, device: DeviceAddress, flags: I2cFlags, count: usize) -> Result<ReadReply>;

    /// Release the adapter
    ///
    /// # Errors
    ///
    /// Returns error if the adapter reports a failure while closing.
    fn close(&mut self) -> Result<()>;

    /// Transport kind, for logging
    fn transport_type(&self) -> TransportType;
}

/// Transport kind identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Linux `/dev/i2c-N` character device
    I2cDev,
    /// In-memory scripted transport
    Mock,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::I2cDev => write!(f, "i2c-dev"),
            Self::Mock => write!(f, "Mock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let f = I2cFlags::NONE | I2cFlags::NO_STOP;
        assert!(f.contains(I2cFlags::NO_STOP));
        assert!(!I2cFlags::NONE.contains(I2cFlags::NO_STOP));
        assert_eq!(I2cFlags::default(), I2cFlags::NONE);
    }

    #[test]
    fn reply_counts_bytes() {
        let r = ReadReply::bytes([1u8, 2, 3, 4]);
        assert_eq!(r.count, 4);
        assert_eq!(ReadReply::status(-7).data.len(), 0);
    }
}
