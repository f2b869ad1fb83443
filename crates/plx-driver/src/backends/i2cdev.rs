//! Linux `i2c-dev` transport
//!
//! Drives a bus exposed as `/dev/i2c-N` by the kernel's `i2c-dev` module.
//!
//! Plain writes and reads go through the character device with `rustix`
//! read/write after selecting the slave with `I2C_SLAVE`. A write flagged
//! [`I2cFlags::NO_STOP`] is held back and issued together with the next
//! read as one `I2C_RDWR` transfer, which gives the repeated-START framing
//! the switch's register protocol requires. `i2c-dev` ioctls are not covered
//! by rustix's API, so they go through `libc` directly.

#![allow(clippy::cast_possible_truncation)]

use crate::error::{PlxError, Result};
use crate::transport::{AdapterMode, DeviceAddress, I2cFlags, ReadReply, Transport, TransportType};
use rustix::fd::AsFd;
use rustix::io::{read, write};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// <linux/i2c-dev.h>
const I2C_TIMEOUT: libc::c_ulong = 0x0702;
const I2C_SLAVE: libc::c_ulong = 0x0703;
const I2C_RDWR: libc::c_ulong = 0x0707;
// <linux/i2c.h>
const I2C_M_RD: u16 = 0x0001;

/// `struct i2c_msg`
#[repr(C)]
#[derive(Debug)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

/// `struct i2c_rdwr_ioctl_data`
#[repr(C)]
#[derive(Debug)]
struct I2cRdwrData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

/// Transport over a Linux `/dev/i2c-N` node
#[derive(Debug)]
pub struct I2cDevTransport {
    path: PathBuf,
    file: Option<File>,
    slave: Option<DeviceAddress>,
    pending: Option<(DeviceAddress, Vec<u8>)>,
}

impl I2cDevTransport {
    /// Open a specific `i2c-dev` node
    ///
    /// # Errors
    ///
    /// Returns error if the node does not exist or cannot be opened.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PlxError::transport(format!(
                "{} not found (is the i2c-dev module loaded?)",
                path.display()
            )));
        }

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        info!("Opened I2C adapter {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            slave: None,
            pending: None,
        })
    }

    /// Node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| PlxError::transport(format!("{} is closed", self.path.display())))
    }

    fn select_slave(&mut self, device: DeviceAddress) -> Result<()> {
        if self.slave == Some(device) {
            return Ok(());
        }
        let fd = self.file()?.as_raw_fd();

        // SAFETY: I2C_SLAVE takes the address by value; fd is an open i2c-dev node.
        let ret = unsafe { libc::ioctl(fd, I2C_SLAVE, libc::c_ulong::from(device)) };
        if ret < 0 {
            return Err(PlxError::transport(format!(
                "I2C_SLAVE {device:#04x}: {}",
                std::io::Error::last_os_error()
            )));
        }
        self.slave = Some(device);
        Ok(())
    }

    /// Issue a held-back write followed by a read as one combined transfer
    fn combined_read(&mut self, device: DeviceAddress, mut out: Vec<u8>, count: usize) -> Result<ReadReply> {
        let fd = self.file()?.as_raw_fd();
        let mut buf = vec![0u8; count];
        let mut msgs = [
            I2cMsg {
                addr: u16::from(device),
                flags: 0,
                len: out.len() as u16,
                buf: out.as_mut_ptr(),
            },
            I2cMsg {
                addr: u16::from(device),
                flags: I2C_M_RD,
                len: count as u16,
                buf: buf.as_mut_ptr(),
            },
        ];
        let mut data = I2cRdwrData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: 2,
        };

        // SAFETY: I2C_RDWR reads `data` and the two messages it points to.
        // Invariants: (1) fd is an open i2c-dev node; (2) both message buffers
        // outlive the call and their lengths match `len`; (3) layouts match
        // <linux/i2c.h>. The kernel writes at most `count` bytes into `buf`.
        let ret = unsafe { libc::ioctl(fd, I2C_RDWR, &raw mut data) };
        if ret < 0 {
            return Self::nak_or_error(std::io::Error::last_os_error());
        }

        debug!("I2C_RDWR {device:#04x}: wrote {:02x?}, read {:02x?}", out, buf);
        Ok(ReadReply::bytes(buf))
    }

    /// A NAK is reported as a zero-length reply, anything else is an error
    fn nak_or_error(err: std::io::Error) -> Result<ReadReply> {
        match err.raw_os_error() {
            Some(libc::ENXIO | libc::EREMOTEIO) => {
                warn!("I2C slave did not acknowledge: {err}");
                Ok(ReadReply::status(0))
            }
            _ => Err(PlxError::transport(format!("I2C transfer failed: {err}"))),
        }
    }

    fn flush_pending(&mut self) -> Result<()> {
        if let Some((device, bytes)) = self.pending.take() {
            warn!("Write to {device:#04x} held for repeated START was not followed by a read");
            self.plain_write(device, &bytes)?;
        }
        Ok(())
    }

    fn plain_write(&mut self, device: DeviceAddress, bytes: &[u8]) -> Result<usize> {
        self.select_slave(device)?;
        write(self.file()?.as_fd(), bytes)
            .map_err(|e| PlxError::transport(format!("Write to {device:#04x} failed: {e}")))
    }
}

impl Transport for I2cDevTransport {
    fn open(channel: u32) -> Result<Self> {
        Self::open_path(format!("/dev/i2c-{channel}"))
    }

    fn configure(&mut self, mode: AdapterMode) -> Result<()> {
        if mode == AdapterMode::SpiI2c {
            debug!("{}: SPI half of {mode:?} not applicable, using I2C", self.path.display());
        }
        Ok(())
    }

    fn set_bitrate(&mut self, khz: u32) -> Result<u32> {
        warn!(
            "{}: bitrate is fixed by the bus driver; requested {khz} kHz not applied",
            self.path.display()
        );
        Ok(khz)
    }

    fn set_bus_timeout(&mut self, ms: u32) -> Result<u32> {
        let fd = self.file()?.as_raw_fd();
        // Kernel timeout unit is 10 ms.
        let units = ms.div_ceil(10).max(1);

        // SAFETY: I2C_TIMEOUT takes the timeout by value; fd is an open i2c-dev node.
        let ret = unsafe { libc::ioctl(fd, I2C_TIMEOUT, libc::c_ulong::from(units)) };
        if ret < 0 {
            return Err(PlxError::transport(format!(
                "I2C_TIMEOUT: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(units * 10)
    }

    fn write(&mut self, device: DeviceAddress, flags: I2cFlags, bytes: &[u8]) -> Result<usize> {
        self.flush_pending()?;
        if flags.contains(I2cFlags::NO_STOP) {
            self.pending = Some((device, bytes.to_vec()));
            return Ok(bytes.len());
        }
        self.plain_write(device, bytes)
    }

    fn read(&mut self, device: DeviceAddress, _flags: I2cFlags, count: usize) -> Result<ReadReply> {
        match self.pending.take() {
            Some((pending_dev, out)) if pending_dev == device => self.combined_read(device, out, count),
            other => {
                self.pending = other;
                self.flush_pending()?;
                self.select_slave(device)?;

                let mut buf = vec![0u8; count];
                match read(self.file()?.as_fd(), &mut buf) {
                    Ok(n) => {
                        buf.truncate(n);
                        Ok(ReadReply::bytes(buf))
                    }
                    Err(e) if matches!(e.raw_os_error(), libc::ENXIO | libc::EREMOTEIO) => {
                        Ok(ReadReply::status(0))
                    }
                    Err(e) => Err(PlxError::transport(format!("Read from {device:#04x} failed: {e}"))),
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.flush_pending()?;
        if self.file.take().is_some() {
            info!("Closed I2C adapter {}", self.path.display());
        }
        Ok(())
    }

    fn transport_type(&self) -> TransportType {
        TransportType::I2cDev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_node_is_transport_error() {
        let err = I2cDevTransport::open_path("/dev/i2c-does-not-exist").unwrap_err();
        assert!(matches!(err, PlxError::Transport { .. }));
    }

    #[test]
    #[ignore] // Requires an I2C adapter at /dev/i2c-0 with a switch at 0x3c
    fn read_debug_control_over_i2c_dev() {
        let mut t = I2cDevTransport::open(0).expect("open /dev/i2c-0");
        t.write(0x3C, I2cFlags::NO_STOP, &plx_chip::address::encode_i2c_read_command(0, 0x1DC))
            .expect("command");
        let reply = t.read(0x3C, I2cFlags::NONE, 4).expect("read");
        println!("Debug Control reply: {reply:?}");
    }
}
