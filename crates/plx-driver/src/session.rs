//! Adapter session lifecycle
//!
//! A [`Session`] owns one transport for the whole open → configure →
//! bitrate → bus timeout → operations → close sequence. It takes `&mut self`
//! for every operation and is not `Sync`, so a handle can never be used from
//! two places at once.
//!
//! There is no per-read timeout beyond the bus timeout set at start. Reading
//! a disabled port can stall the bus on some parts.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::error::Result;
use crate::page::{EepromPageWriter, Fill, PageWriteReport};
use crate::reader::{RangeReads, RegisterReader, RetryPolicy, DEFAULT_DEVICE_ADDRESS};
use crate::status::Switch;
use crate::transport::{AdapterMode, DeviceAddress, Transport};
use tracing::{info, warn};

/// Session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Adapter index (`/dev/i2c-N` for the Linux transport)
    pub channel: u32,
    /// Adapter function mode
    pub mode: AdapterMode,
    /// Requested I2C bitrate (kHz)
    pub bitrate_khz: u32,
    /// Bus-lock timeout (ms)
    pub bus_timeout_ms: u32,
    /// Switch address
    pub device: DeviceAddress,
    /// Retry policy for register reads
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            mode: AdapterMode::SpiI2c,
            bitrate_khz: 100,
            bus_timeout_ms: 150,
            device: DEFAULT_DEVICE_ADDRESS,
            retry: RetryPolicy::NONE,
        }
    }
}

/// Exclusive handle on an opened, configured adapter
#[derive(Debug)]
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    bitrate_khz: u32,
    bus_timeout_ms: u32,
    closed: bool,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T: Transport> Session<T> {
    /// Open the adapter on `config.channel` and start a session on it
    ///
    /// # Errors
    ///
    /// Returns error if the adapter cannot be opened or configured.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let transport = T::open(config.channel)?;
        Self::start(transport, config)
    }

    /// Start a session on an already opened transport
    ///
    /// Applies mode, bitrate and bus timeout in that order. The adapter may
    /// round the bitrate and timeout; the applied values are kept.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error.
    pub fn start(mut transport: T, config: SessionConfig) -> Result<Self> {
        transport.configure(config.mode)?;
        let bitrate_khz = transport.set_bitrate(config.bitrate_khz)?;
        let bus_timeout_ms = transport.set_bus_timeout(config.bus_timeout_ms)?;

        info!(
            "Session on {} channel {}: {bitrate_khz} kHz, bus timeout {bus_timeout_ms} ms, switch {:#04x}",
            transport.transport_type(),
            config.channel,
            config.device
        );

        Ok(Self {
            transport,
            config,
            bitrate_khz,
            bus_timeout_ms,
            closed: false,
            _not_sync: PhantomData,
        })
    }

    /// Requested configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Bitrate the adapter applied (kHz)
    pub const fn bitrate_khz(&self) -> u32 {
        self.bitrate_khz
    }

    /// Bus timeout the adapter applied (ms)
    pub const fn bus_timeout_ms(&self) -> u32 {
        self.bus_timeout_ms
    }

    /// Register reader for the configured switch
    pub const fn reader(&self) -> RegisterReader {
        RegisterReader::new(self.config.device).with_retry(self.config.retry)
    }

    /// Read one switch register
    ///
    /// # Errors
    ///
    /// See [`RegisterReader::read_qword`].
    pub fn read_qword(&mut self, port: u8, byte_offset: u32) -> Result<u32> {
        self.reader().read_qword(&mut self.transport, port, byte_offset)
    }

    /// Read successive registers; see [`RegisterReader::read_range`]
    pub fn read_range(&mut self, port: u8, byte_offset: u32, length: u32) -> RangeReads<'_, T> {
        self.reader().read_range(&mut self.transport, port, byte_offset, length)
    }

    /// Status queries against the configured switch
    pub fn switch(&mut self) -> Switch<'_, T> {
        let reader = self.reader();
        Switch::new(&mut self.transport, reader)
    }

    /// Program a range of an EEPROM at `device` with `writer`
    ///
    /// # Errors
    ///
    /// See [`EepromPageWriter::write_range`].
    pub fn write_eeprom(
        &mut self,
        writer: &EepromPageWriter,
        device: DeviceAddress,
        start_address: usize,
        length: usize,
        fill: Fill,
    ) -> Result<PageWriteReport> {
        writer.write_range(&mut self.transport, device, start_address, length, fill)
    }

    /// Underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Close the adapter
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails to close cleanly.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.transport.close()?;
        info!("Session on channel {} closed", self.config.channel);
        Ok(())
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.transport.close() {
            warn!("Closing channel {} on drop failed: {e}", self.config.channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockTransport;

    #[test]
    fn defaults() {
        let c = SessionConfig::default();
        assert_eq!(c.channel, 0);
        assert_eq!(c.mode, AdapterMode::SpiI2c);
        assert_eq!(c.bitrate_khz, 100);
        assert_eq!(c.bus_timeout_ms, 150);
        assert_eq!(c.device, 0x3C);
        assert_eq!(c.retry, RetryPolicy::NONE);
    }

    #[test]
    fn open_applies_configuration() {
        let config = SessionConfig {
            channel: 2,
            bitrate_khz: 400,
            ..SessionConfig::default()
        };
        let s = Session::<MockTransport>::open(config).unwrap();

        let t = s.transport();
        assert_eq!(t.channel(), 2);
        assert_eq!(t.mode(), Some(AdapterMode::SpiI2c));
        assert_eq!(t.bitrate_khz(), Some(400));
        assert_eq!(t.bus_timeout_ms(), Some(150));
        assert_eq!(s.bitrate_khz(), 400);
        assert_eq!(s.bus_timeout_ms(), 150);
    }

    #[test]
    fn reads_use_configured_device() {
        let mut t = MockTransport::new();
        t.set_register(0, 0x574, 0x0000_0004);
        let config = SessionConfig {
            device: 0x38,
            ..SessionConfig::default()
        };
        let mut s = Session::start(t, config).unwrap();

        assert_eq!(s.read_qword(0, 0x574).unwrap(), 4);
        assert!(matches!(
            s.transport().transactions()[0],
            crate::backends::Transaction::Write { device: 0x38, .. }
        ));
    }

    #[test]
    fn explicit_close() {
        let s = Session::start(MockTransport::new(), SessionConfig::default()).unwrap();
        assert!(s.close().is_ok());
    }

    #[test]
    fn eeprom_write_through_session() {
        let mut s = Session::start(MockTransport::new(), SessionConfig::default()).unwrap();
        let writer = EepromPageWriter::new(crate::page::PageWriterConfig {
            write_delay: std::time::Duration::ZERO,
            ..Default::default()
        });
        let report = s.write_eeprom(&writer, 0x50, 0, 16, Fill::Zero).unwrap();
        assert_eq!(report.pages_written, 2);
        assert_eq!(s.transport_mut().written().len(), 2);
    }
}
