//! Transport implementations
//!
//! Two transports available:
//! - **i2c-dev**: Linux `/dev/i2c-N` nodes (any kernel-supported adapter)
//! - **Mock**: scripted in-memory bus (tests, dry runs, no hardware)

#[cfg(target_os = "linux")]
pub mod i2cdev;
pub mod mock;

#[cfg(target_os = "linux")]
pub use i2cdev::I2cDevTransport;
pub use mock::{MockTransport, Transaction};
