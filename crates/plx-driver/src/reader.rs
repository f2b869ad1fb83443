//! Register reads over I2C
//!
//! One register read is one bus transaction:
//!
//! ```text
//! S addr+W  [04 pp po oo]  Sr addr+R  [b0 b1 b2 b3]  P
//!           command frame  (no STOP)   value, b0 = MSB
//! ```
//!
//! The reply must be exactly four bytes. No retry is performed unless a
//! [`RetryPolicy`] asks for one.

use std::time::Duration;

use crate::error::{PlxError, Result};
use crate::transport::{DeviceAddress, I2cFlags, Transport};
use plx_chip::address::{encode_i2c_read_command, I2C_PORT_MAX};
use tracing::{debug, warn};

/// Register width in bytes
pub const QWORD_LEN: usize = 4;

/// Default I2C address of the switch on the reference boards
///
/// The part default is 0x38; boards strap it to 0x3C.
pub const DEFAULT_DEVICE_ADDRESS: DeviceAddress = 0x3C;

/// Retry policy for register reads
///
/// The default performs no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub retries: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// No retries
    pub const NONE: Self = Self {
        retries: 0,
        delay: Duration::ZERO,
    };

    /// Retry up to `retries` times with `delay` between attempts
    pub const fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }
}

/// Read the 32-bit register at `(port, byte_offset)` on `device`
///
/// # Errors
///
/// - `PortOutOfRange` if `port` does not fit the command frame (checked
///   before any bus traffic)
/// - `Transport` if the adapter fails
/// - `ShortRead` if the adapter reports zero or a negative count
/// - `UnexpectedLength` if the adapter reports any count other than 4
pub fn read_qword<T: Transport + ?Sized>(
    transport: &mut T,
    device: DeviceAddress,
    port: u8,
    byte_offset: u32,
) -> Result<u32> {
    if port > I2C_PORT_MAX {
        return Err(PlxError::PortOutOfRange {
            port,
            max: I2C_PORT_MAX,
        });
    }

    let command = encode_i2c_read_command(port, byte_offset);
    transport.write(device, I2cFlags::NO_STOP, &command)?;
    let reply = transport.read(device, I2cFlags::NONE, QWORD_LEN)?;

    if reply.count <= 0 {
        return Err(PlxError::short_read(reply.count));
    }
    if reply.count != QWORD_LEN as i32 {
        return Err(PlxError::unexpected_length(reply.count, QWORD_LEN));
    }
    let Some(&[b0, b1, b2, b3]) = reply.data.first_chunk::<QWORD_LEN>() else {
        let delivered = i32::try_from(reply.data.len()).unwrap_or(i32::MAX);
        return Err(PlxError::unexpected_length(delivered, QWORD_LEN));
    };

    // First byte on the wire is the most significant.
    let value = u32::from_be_bytes([b0, b1, b2, b3]);
    debug!("read {device:#04x} port {port} [{byte_offset:#05x}] = {value:#010x}");
    Ok(value)
}

/// Register reader bound to one switch address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterReader {
    device: DeviceAddress,
    retry: RetryPolicy,
}

impl Default for RegisterReader {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_ADDRESS)
    }
}

impl RegisterReader {
    /// Reader for the switch at `device`, without retries
    pub const fn new(device: DeviceAddress) -> Self {
        Self {
            device,
            retry: RetryPolicy::NONE,
        }
    }

    /// Use `retry` for every read
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Switch address
    pub const fn device(&self) -> DeviceAddress {
        self.device
    }

    /// Retry policy in use
    pub const fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Read one register, honouring the retry policy
    ///
    /// # Errors
    ///
    /// Returns the last error once the retry budget is spent. Non-transient
    /// errors (such as `PortOutOfRange`) are returned immediately.
    pub fn read_qword<T: Transport + ?Sized>(&self, transport: &mut T, port: u8, byte_offset: u32) -> Result<u32> {
        let mut attempt = 0;
        loop {
            match read_qword(&mut *transport, self.device, port, byte_offset) {
                Err(e) if e.is_transient() && attempt < self.retry.retries => {
                    attempt += 1;
                    warn!(
                        "read port {port} [{byte_offset:#05x}] failed ({e}), retry {attempt}/{}",
                        self.retry.retries
                    );
                    if !self.retry.delay.is_zero() {
                        std::thread::sleep(self.retry.delay);
                    }
                }
                result => return result,
            }
        }
    }

    /// Read `length` bytes of register space starting at `byte_offset`, one
    /// register at a time
    ///
    /// Yields `(register_offset, result)` for offsets `byte_offset + 4·i`.
    /// Each read is issued only when the iterator is advanced, so the caller
    /// chooses whether to stop at the first error.
    pub fn read_range<'t, T: Transport + ?Sized>(
        &self,
        transport: &'t mut T,
        port: u8,
        byte_offset: u32,
        length: u32,
    ) -> RangeReads<'t, T> {
        RangeReads {
            reader: *self,
            transport,
            port,
            next: byte_offset,
            end: byte_offset.saturating_add(length),
        }
    }
}

/// Iterator returned by [`RegisterReader::read_range`]
#[derive(Debug)]
pub struct RangeReads<'t, T: Transport + ?Sized> {
    reader: RegisterReader,
    transport: &'t mut T,
    port: u8,
    next: u32,
    end: u32,
}

impl<T: Transport + ?Sized> Iterator for RangeReads<'_, T> {
    type Item = (u32, Result<u32>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let offset = self.next;
        self.next = self.next.saturating_add(QWORD_LEN as u32);
        let result = self.reader.read_qword(&mut *self.transport, self.port, offset);
        Some((offset, result))
    }
}
