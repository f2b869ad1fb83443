//! Register access and EEPROM tooling for PLX PEX86xx / PEX87xx PCIe switches.
//!
//! The switch exposes its configuration space over I2C. This crate speaks
//! that protocol through a [`Transport`], decodes the status registers the
//! debug tooling cares about, and builds the serial EEPROM images the
//! switch replays at power-up.
//!
//! # Layers
//!
//! ```text
//! Session<T>          open → configure → bitrate → bus timeout → … → close
//!   ├─ RegisterReader   4-byte command (no STOP) + 4-byte read, MSB first
//!   │    └─ Switch      status queries, typed register records
//!   └─ EepromPageWriter page-bounded raw EEPROM writes
//!
//! EepromStreamBuilder  register-write stream → EEPROM image (no I/O)
//! ```
//!
//! Transports:
//!
//! - [`backends::I2cDevTransport`]: Linux `/dev/i2c-N`
//! - [`backends::MockTransport`]: scripted, in-memory (tests and dry runs)
//!
//! # Quick start
//!
//! ```no_run
//! use plx_driver::backends::I2cDevTransport;
//! use plx_driver::{Session, SessionConfig};
//!
//! # fn main() -> plx_driver::Result<()> {
//! let mut session = Session::<I2cDevTransport>::open(SessionConfig::default())?;
//! let debug_control = session.switch().debug_control()?;
//! println!("upstream port {}", debug_control.upstream_port_id);
//! session.close()
//! # }
//! ```
//!
//! Building an image needs no hardware:
//!
//! ```
//! use plx_driver::{EepromStreamBuilder, StreamConfig};
//!
//! let image = EepromStreamBuilder::from_config(&StreamConfig::default())
//!     .serialize()
//!     .unwrap();
//! assert_eq!(image[0], 0x5A);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
pub mod decode;
mod error;
pub mod page;
pub mod reader;
pub mod session;
pub mod status;
pub mod stream;
pub mod transport;

pub use decode::{
    decode, decode_field, DebugControl, DecodedField, DecodedRegister, FieldValue, LinkStatus, LinkStatusControl2,
    PortLink, RegisterRecord,
};
pub use error::{PlxError, Result};
pub use page::{EepromPageWriter, Fill, PageWriteReport, PageWriterConfig};
pub use reader::{read_qword, RegisterReader, RetryPolicy};
pub use session::{Session, SessionConfig};
pub use status::Switch;
pub use stream::{EepromStreamBuilder, PortConfigPreset, RegisterEntry, StreamConfig, UpstreamRole};
pub use transport::{AdapterMode, DeviceAddress, I2cFlags, ReadReply, Transport, TransportType};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        EepromPageWriter, EepromStreamBuilder, Fill, PlxError, RegisterReader, Result, Session, SessionConfig,
        StreamConfig, Switch, Transport,
    };
}
