//! Scripted in-memory transport
//!
//! Implements [`Transport`] without any hardware. This enables:
//!
//! 1. **CI without hardware**: every protocol layer (register reads, status
//!    queries, EEPROM page writes) runs against it in unit and integration
//!    tests.
//!
//! 2. **Wire-level assertions**: every transfer is logged as a
//!    [`Transaction`], so tests can check exact command frames and flags.
//!
//! ## Reply model
//!
//! A read is answered, in order of preference, by:
//!
//! 1. the next queued [`ReadReply`] (see [`MockTransport::queue_reply`]);
//! 2. the register value stored for the `(port, offset)` named by the most
//!    recent 4-byte read command, sent most-significant byte first;
//! 3. an empty reply with `count == 0`, which is what an adapter reports
//!    when the slave NAKs.

use std::collections::{HashMap, VecDeque};

use crate::error::{PlxError, Result};
use crate::transport::{AdapterMode, DeviceAddress, I2cFlags, ReadReply, Transport, TransportType};
use plx_chip::address::CMD_READ;
use tracing::debug;

/// One logged bus transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// A write of `bytes`
    Write {
        /// Slave address
        device: DeviceAddress,
        /// Transfer flags
        flags: I2cFlags,
        /// Bytes written
        bytes: Vec<u8>,
    },
    /// A read request for `count` bytes
    Read {
        /// Slave address
        device: DeviceAddress,
        /// Transfer flags
        flags: I2cFlags,
        /// Bytes requested
        count: usize,
    },
}

/// In-memory transport for tests and dry runs
#[derive(Debug, Default)]
pub struct MockTransport {
    channel: u32,
    mode: Option<AdapterMode>,
    bitrate_khz: Option<u32>,
    bus_timeout_ms: Option<u32>,
    closed: bool,

    replies: VecDeque<ReadReply>,
    registers: HashMap<(u8, u32), u32>,
    last_command: Option<(u8, u32)>,

    log: Vec<Transaction>,
    writes: usize,
    fail_write_at: Option<usize>,
}

impl MockTransport {
    /// Create an empty mock on channel 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next read
    pub fn queue_reply(&mut self, reply: ReadReply) -> &mut Self {
        self.replies.push_back(reply);
        self
    }

    /// Store a register value to be served by matching read commands
    pub fn set_register(&mut self, port: u8, offset: u32, value: u32) -> &mut Self {
        self.registers.insert((port, offset & !0x3), value);
        self
    }

    /// Make the `n`th write (0-based) fail with a transport error
    pub fn fail_write_at(&mut self, n: usize) -> &mut Self {
        self.fail_write_at = Some(n);
        self
    }

    /// All transfers seen so far
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Bytes of every write, in order
    pub fn written(&self) -> Vec<&[u8]> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Write { bytes, .. } => Some(bytes.as_slice()),
                Transaction::Read { .. } => None,
            })
            .collect()
    }

    /// Channel passed to `open`
    pub const fn channel(&self) -> u32 {
        self.channel
    }

    /// Mode applied by `configure`
    pub const fn mode(&self) -> Option<AdapterMode> {
        self.mode
    }

    /// Bitrate applied by `set_bitrate`
    pub const fn bitrate_khz(&self) -> Option<u32> {
        self.bitrate_khz
    }

    /// Timeout applied by `set_bus_timeout`
    pub const fn bus_timeout_ms(&self) -> Option<u32> {
        self.bus_timeout_ms
    }

    /// True once `close` has been called
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Recover `(port, offset)` from a register read command frame
    fn parse_read_command(bytes: &[u8]) -> Option<(u8, u32)> {
        match *bytes {
            [CMD_READ, hi, mid, lo] => {
                let port = (hi << 1) | (mid >> 7);
                let offset = (u32::from(mid & 0x3) << 10) | (u32::from(lo) << 2);
                Some((port, offset))
            }
            _ => None,
        }
    }
}

impl Transport for MockTransport {
    fn open(channel: u32) -> Result<Self> {
        debug!("Opening mock transport on channel {channel}");
        Ok(Self {
            channel,
            ..Self::default()
        })
    }

    fn configure(&mut self, mode: AdapterMode) -> Result<()> {
        self.mode = Some(mode);
        Ok(())
    }

    fn set_bitrate(&mut self, khz: u32) -> Result<u32> {
        self.bitrate_khz = Some(khz);
        Ok(khz)
    }

    fn set_bus_timeout(&mut self, ms: u32) -> Result<u32> {
        self.bus_timeout_ms = Some(ms);
        Ok(ms)
    }

    fn write(&mut self, device: DeviceAddress, flags: I2cFlags, bytes: &[u8]) -> Result<usize> {
        let index = self.writes;
        self.writes += 1;
        self.log.push(Transaction::Write {
            device,
            flags,
            bytes: bytes.to_vec(),
        });

        if self.fail_write_at == Some(index) {
            return Err(PlxError::transport(format!("injected failure on write {index}")));
        }

        self.last_command = Self::parse_read_command(bytes);
        Ok(bytes.len())
    }

    fn read(&mut self, device: DeviceAddress, flags: I2cFlags, count: usize) -> Result<ReadReply> {
        self.log.push(Transaction::Read {
            device,
            flags,
            count,
        });

        if let Some(reply) = self.replies.pop_front() {
            return Ok(reply);
        }

        let value = self
            .last_command
            .and_then(|key| self.registers.get(&key).copied());
        Ok(value.map_or_else(|| ReadReply::status(0), |v| ReadReply::bytes(v.to_be_bytes())))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Mock
    }
}
