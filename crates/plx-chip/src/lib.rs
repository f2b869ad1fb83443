//! Silicon model for PLX (Broadcom) PEX86xx / PEX87xx PCIe switches.
//!
//! This crate has **no dependencies** and **no hardware access**: it is a
//! pure model of the parts of the switch that software has to get exactly
//! right: register address encodings, register offsets and bitfield layouts,
//! port-configuration strap topologies, and the serial EEPROM stream format.
//!
//! Everything here is taken from the PEX8619 / PEX8732 / PEX8734 data books.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`address`] | I2C command frames and EEPROM stream register addresses |
//! | [`regs`] | Register offsets and bitfield schemas (Debug Control, Link Status, …) |
//! | [`portmap`] | `portcfg` strap code → 16-slot lane-width topology |
//! | [`eeprom`] | Serial EEPROM image layout and AT24C02 page geometry |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod address;
pub mod eeprom;
pub mod portmap;
pub mod regs;
