//! Direct EEPROM page programming
//!
//! Writes raw bytes into a small I2C EEPROM (AT24C02 class). Each transfer
//! is one page write: a one-byte word address followed by data that stays
//! inside a single page. The part then needs its write-cycle time before the
//! next transfer.

#![allow(clippy::cast_possible_truncation)]

use std::time::Duration;

use crate::error::Result;
use crate::transport::{DeviceAddress, I2cFlags, Transport};
use plx_chip::eeprom::at24c02;
use tracing::{debug, info};

/// Usual I2C address of an AT24C02 with its address pins tied low
pub const DEFAULT_EEPROM_ADDRESS: DeviceAddress = 0x50;

/// Fill pattern for [`EepromPageWriter::write_range`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fill {
    /// Byte `n` of the range is `n & 0xFF`
    #[default]
    Incrementing,
    /// All zero
    Zero,
}

impl Fill {
    fn byte(self, n: usize) -> u8 {
        match self {
            Self::Incrementing => (n & 0xFF) as u8,
            Self::Zero => 0,
        }
    }
}

/// Page writer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWriterConfig {
    /// Page size in bytes; no transfer crosses a page boundary
    pub page_size: usize,
    /// Pause after each page write
    pub write_delay: Duration,
}

impl Default for PageWriterConfig {
    fn default() -> Self {
        Self {
            page_size: at24c02::PAGE_SIZE,
            write_delay: Duration::from_millis(at24c02::WRITE_CYCLE_MS),
        }
    }
}

/// Summary of a completed [`EepromPageWriter::write_range`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageWriteReport {
    /// Transfers issued
    pub pages_written: usize,
    /// Data bytes written, excluding address bytes
    pub bytes_written: usize,
}

/// EEPROM page writer
#[derive(Debug, Clone, Copy, Default)]
pub struct EepromPageWriter {
    config: PageWriterConfig,
}

impl EepromPageWriter {
    /// Writer with `config`; a zero page size is treated as one byte
    pub fn new(config: PageWriterConfig) -> Self {
        Self {
            config: PageWriterConfig {
                page_size: config.page_size.max(1),
                ..config
            },
        }
    }

    /// Configuration in use
    pub const fn config(&self) -> &PageWriterConfig {
        &self.config
    }

    /// Write `length` bytes of `fill` starting at `start_address`
    ///
    /// Only the low byte of each transfer's address is sent, matching the
    /// one-byte word address of the part.
    ///
    /// # Errors
    ///
    /// Returns the first transport error. Nothing after it is written and
    /// nothing is retried.
    pub fn write_range<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        device: DeviceAddress,
        start_address: usize,
        length: usize,
        fill: Fill,
    ) -> Result<PageWriteReport> {
        info!("Writing {length} bytes at {start_address:#04x} to EEPROM {device:#04x} ({fill:?})");

        let page = self.config.page_size;
        let mut report = PageWriteReport::default();
        let mut address = start_address;
        let mut buf = Vec::with_capacity(page + 1);

        while report.bytes_written < length {
            let chunk = (page - address % page).min(length - report.bytes_written);

            buf.clear();
            buf.push((address & 0xFF) as u8);
            buf.extend((report.bytes_written..report.bytes_written + chunk).map(|n| fill.byte(n)));

            transport.write(device, I2cFlags::NONE, &buf)?;
            debug!("Page write {address:#04x}: {:02x?}", &buf[1..]);

            if !self.config.write_delay.is_zero() {
                std::thread::sleep(self.config.write_delay);
            }

            report.pages_written += 1;
            report.bytes_written += chunk;
            address += chunk;
        }

        info!(
            "EEPROM write done: {} bytes in {} pages",
            report.bytes_written, report.pages_written
        );
        Ok(report)
    }
}
