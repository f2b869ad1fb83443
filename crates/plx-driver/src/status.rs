//! Switch status queries
//!
//! The health report of the debug tooling: strap configuration, port and
//! lane state, negotiated links, error counters, and decoded control
//! registers. Device-wide registers are read through port 0.
//!
//! Reading a per-port register of a disabled port may stall the bus, so the
//! per-port reports are usually run through [`Switch::for_enabled_ports`].

#![allow(clippy::cast_possible_truncation)]

use crate::decode::{
    decode, decode_port_links, DebugControl, DecodedRegister, LinkStatus, LinkStatusControl2, PortLink, RegisterRecord,
};
use crate::error::{PlxError, Result};
use crate::reader::RegisterReader;
use crate::transport::Transport;
use plx_chip::portmap::{self, PortMap};
use plx_chip::regs::{self, RegisterSchema, NUM_LANES, NUM_PORTS};
use tracing::{debug, warn};

/// One flag per port or lane
pub type PortFlags = [bool; NUM_PORTS];

/// Receive error counters, one per lane
pub type LaneCounts = [u8; NUM_LANES];

/// `N` consecutive bits of `value` starting at `first`; `first + N` must not exceed 32
fn bits<const N: usize>(value: u32, first: u32) -> [bool; N] {
    std::array::from_fn(|i| (value >> (first + i as u32)) & 1 == 1)
}

/// Borrowed transport plus reader, scoped to one switch
#[derive(Debug)]
pub struct Switch<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    reader: RegisterReader,
}

impl<'t, T: Transport + ?Sized> Switch<'t, T> {
    /// Query the switch `reader` points at over `transport`
    pub fn new(transport: &'t mut T, reader: RegisterReader) -> Self {
        Self { transport, reader }
    }

    fn read(&mut self, port: u8, offset: u32) -> Result<u32> {
        self.reader.read_qword(&mut *self.transport, port, offset)
    }

    /// Read and decode a per-port register
    ///
    /// # Errors
    ///
    /// Returns read errors, or `SchemaRange` if the value does not decode.
    pub fn read_record<R: RegisterRecord>(&mut self, port: u8) -> Result<R> {
        let raw = self.read(port, R::SCHEMA.offset)?;
        debug!("{} port {port}: {raw:#010x}", R::SCHEMA.name);
        R::from_raw(raw)
    }

    /// Read a register of `port` and decode it against `schema`
    ///
    /// # Errors
    ///
    /// Returns read errors, or `SchemaRange` if the value does not decode.
    pub fn read_decoded(&mut self, port: u8, schema: &'static RegisterSchema) -> Result<DecodedRegister> {
        let raw = self.read(port, schema.offset)?;
        decode(raw, schema)
    }

    /// Strap `portcfg` code
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn port_config(&mut self) -> Result<u32> {
        Ok(self.read(0, regs::PORT_CONFIG)? & regs::PORT_CONFIG_MASK)
    }

    /// Lane width of each port slot for the strapped configuration
    ///
    /// # Errors
    ///
    /// Returns read errors, or `UnsupportedPortConfig` for codes above 8.
    pub fn port_map(&mut self) -> Result<(u32, &'static PortMap)> {
        let code = self.port_config()?;
        let map = portmap::lookup(code).ok_or(PlxError::UnsupportedPortConfig { code })?;
        Ok((code, map))
    }

    /// Which ports are enabled
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn ports_enabled(&mut self) -> Result<PortFlags> {
        Ok(bits(self.read(0, regs::PORTS_ENABLED)?, 0))
    }

    /// Which lanes detected a receiver
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn receivers_detected(&mut self) -> Result<[bool; NUM_LANES]> {
        let low: [bool; 8] = bits(self.read(0, regs::RECEIVER_DETECT_LOW)?, 24);
        let high: [bool; 8] = bits(self.read(0, regs::RECEIVER_DETECT_HIGH)?, 24);
        Ok(std::array::from_fn(|i| if i < 8 { low[i] } else { high[i - 8] }))
    }

    /// Which lanes are up
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn lanes_up(&mut self) -> Result<[bool; NUM_LANES]> {
        Ok(bits(self.read(0, regs::LANES_UP)?, 0))
    }

    /// Negotiated width and speed of every port
    ///
    /// # Errors
    ///
    /// Returns read errors, or `SchemaRange` for a width code above 3.
    pub fn link_widths_and_speeds(&mut self) -> Result<[PortLink; NUM_PORTS]> {
        let low = decode_port_links(self.read(0, regs::LINK_WIDTH_SPEED_LOW)?)?;
        let high = decode_port_links(self.read(0, regs::LINK_WIDTH_SPEED_HIGH)?)?;
        Ok(std::array::from_fn(|i| if i < 8 { low[i] } else { high[i - 8] }))
    }

    /// Receive error counter of every lane
    ///
    /// Even and odd lanes live in separate registers, one byte per lane in
    /// ascending byte order.
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn receive_error_counts(&mut self) -> Result<LaneCounts> {
        let even_low = self.read(0, regs::RX_ERRORS_EVEN_LOW)?.to_le_bytes();
        let odd_low = self.read(0, regs::RX_ERRORS_ODD_LOW)?.to_le_bytes();
        let even_high = self.read(0, regs::RX_ERRORS_EVEN_HIGH)?.to_le_bytes();
        let odd_high = self.read(0, regs::RX_ERRORS_ODD_HIGH)?.to_le_bytes();

        Ok(std::array::from_fn(|lane| {
            let (even, odd) = if lane < 8 { (&even_low, &odd_low) } else { (&even_high, &odd_high) };
            let byte = (lane % 8) / 2;
            if lane % 2 == 0 {
                even[byte]
            } else {
                odd[byte]
            }
        }))
    }

    /// Debug Control register
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn debug_control(&mut self) -> Result<DebugControl> {
        self.read_record(0)
    }

    /// Link Status of `port`
    ///
    /// # Errors
    ///
    /// Returns read errors, or `SchemaRange` for an unknown speed code.
    pub fn link_status(&mut self, port: u8) -> Result<LinkStatus> {
        self.read_record(port)
    }

    /// Link Control 2 / Link Status 2 of `port`
    ///
    /// # Errors
    ///
    /// Returns read errors, or `SchemaRange` for an unknown speed code.
    pub fn link_status_control2(&mut self, port: u8) -> Result<LinkStatusControl2> {
        self.read_record(port)
    }

    /// True while VC0 flow-control negotiation is pending on `port`
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn vc0_negotiation_pending(&mut self, port: u8) -> Result<bool> {
        let raw = self.read(port, regs::VC0_RESOURCE_STATUS)?;
        Ok((raw >> regs::VC0_NEGOTIATION_PENDING_BIT) & 1 == 1)
    }

    /// Bad TLP counter of `port`
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn bad_tlp_count(&mut self, port: u8) -> Result<u32> {
        self.read(port, regs::BAD_TLP_COUNT)
    }

    /// Bad DLLP counter of `port`
    ///
    /// # Errors
    ///
    /// Returns read errors.
    pub fn bad_dllp_count(&mut self, port: u8) -> Result<u32> {
        self.read(port, regs::BAD_DLLP_COUNT)
    }

    /// Run `query` on every port
    ///
    /// A failing port is logged and kept in the output; the scan continues.
    pub fn for_all_ports<R>(&mut self, query: impl FnMut(&mut Self, u8) -> Result<R>) -> Vec<(u8, Result<R>)> {
        self.for_enabled_ports(&[true; NUM_PORTS], query)
    }

    /// Run `query` on every port flagged in `enabled`
    ///
    /// A failing port is logged and kept in the output; the scan continues.
    pub fn for_enabled_ports<R>(
        &mut self,
        enabled: &PortFlags,
        mut query: impl FnMut(&mut Self, u8) -> Result<R>,
    ) -> Vec<(u8, Result<R>)> {
        enabled
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(port, _)| {
                let port = port as u8;
                let result = query(self, port);
                if let Err(e) = &result {
                    warn!("Port {port}: {e}");
                }
                (port, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockTransport;
    use plx_chip::regs::LinkSpeed;

    fn switch(t: &mut MockTransport) -> Switch<'_, MockTransport> {
        Switch::new(t, RegisterReader::new(0x3C))
    }

    #[test]
    fn port_config_and_map() {
        let mut t = MockTransport::new();
        t.set_register(0, 0x574, 0xABCD_EF04);
        let (code, map) = switch(&mut t).port_map().unwrap();
        assert_eq!(code, 4);
        assert_eq!(map[..4], [4, 4, 4, 4]);
    }

    #[test]
    fn unknown_port_config() {
        let mut t = MockTransport::new();
        t.set_register(0, 0x574, 0x9);
        assert!(matches!(
            switch(&mut t).port_map(),
            Err(PlxError::UnsupportedPortConfig { code: 9 })
        ));
    }

    #[test]
    fn port_and_lane_flags() {
        let mut t = MockTransport::new();
        t.set_register(0, 0x668, 0b1000_0000_0001_0011)
            .set_register(0, 0x200, 0x8100_0000)
            .set_register(0, 0x204, 0x0300_0000)
            .set_register(0, 0x1F4, 0xFFFF_0003);
        let mut s = switch(&mut t);

        let en = s.ports_enabled().unwrap();
        assert_eq!(en.iter().filter(|&&e| e).count(), 4);
        assert!(en[0] && en[1] && en[4] && en[15]);

        let rd = s.receivers_detected().unwrap();
        assert!(rd[0] && rd[7] && rd[8] && rd[9]);
        assert_eq!(rd.iter().filter(|&&e| e).count(), 4);

        let up = s.lanes_up().unwrap();
        assert!(up[0] && up[1] && !up[2]);
        assert_eq!(up.iter().filter(|&&e| e).count(), 2);
    }

    #[test]
    fn receiver_detect_uses_top_byte_only() {
        let mut t = MockTransport::new();
        t.set_register(0, 0x200, 0xFF00_0000).set_register(0, 0x204, 0x0100_00FF);

        let rd = switch(&mut t).receivers_detected().unwrap();
        assert!(rd[..8].iter().all(|&e| e));
        assert!(rd[8]);
        assert_eq!(rd[9..].iter().filter(|&&e| e).count(), 0);
    }

    #[test]
    fn bit_extraction_stops_at_word_end() {
        let top: [bool; 8] = bits(0x8000_0000, 24);
        assert_eq!(top, [false, false, false, false, false, false, false, true]);
        let all: [bool; 32] = bits(u32::MAX, 0);
        assert!(all.iter().all(|&b| b));
    }

    #[test]
    fn links_and_speeds() {
        let mut t = MockTransport::new();
        // port 0: x8 @ 5.0; port 8: x4 @ 2.5
        t.set_register(0, 0x66C, 0b00_1011).set_register(0, 0x670, 0b00_0010);
        let links = switch(&mut t).link_widths_and_speeds().unwrap();
        assert_eq!(links[0], PortLink { lanes: 8, speed: LinkSpeed::Gen2 });
        assert_eq!(links[1], PortLink { lanes: 1, speed: LinkSpeed::Gen1 });
        assert_eq!(links[8], PortLink { lanes: 4, speed: LinkSpeed::Gen1 });
    }

    #[test]
    fn receive_errors_interleave() {
        let mut t = MockTransport::new();
        t.set_register(0, 0xB88, 0x0604_0200)
            .set_register(0, 0xB8C, 0x0705_0301)
            .set_register(0, 0xB90, 0x0E0C_0A08)
            .set_register(0, 0xB94, 0x0F0D_0B09);
        let counts = switch(&mut t).receive_error_counts().unwrap();
        let expected: LaneCounts = std::array::from_fn(|i| i as u8);
        assert_eq!(counts, expected);
    }

    #[test]
    fn per_port_registers() {
        let mut t = MockTransport::new();
        t.set_register(3, 0x160, 1 << 17)
            .set_register(3, 0x1E8, 12)
            .set_register(3, 0x1EC, 34)
            .set_register(3, 0x78, (1 << 29) | (4 << 20) | (1 << 16))
            .set_register(3, 0x98, 0x2)
            .set_register(0, 0x1DC, 1 << 18);
        let mut s = switch(&mut t);

        assert!(s.vc0_negotiation_pending(3).unwrap());
        assert_eq!(s.bad_tlp_count(3).unwrap(), 12);
        assert_eq!(s.bad_dllp_count(3).unwrap(), 34);

        let ls = s.link_status(3).unwrap();
        assert_eq!(ls.negotiated_link_width, 4);
        assert_eq!(ls.current_link_speed, LinkSpeed::Gen1);
        assert!(ls.data_link_layer_link_active);

        assert_eq!(s.link_status_control2(3).unwrap().target_link_speed, LinkSpeed::Gen2);
        assert!(s.debug_control().unwrap().nt_mode_enable);

        let d = s.read_decoded(3, LinkStatus::SCHEMA).unwrap();
        assert_eq!(d["Negotiated Link Width"], 4);
    }

    #[test]
    fn enabled_port_scan_continues_past_failures() {
        let mut t = MockTransport::new();
        t.set_register(0, 0x1E8, 1).set_register(5, 0x1E8, 5);
        let mut enabled = [false; NUM_PORTS];
        enabled[0] = true;
        enabled[2] = true;
        enabled[5] = true;

        let results = switch(&mut t).for_enabled_ports(&enabled, |s, port| s.bad_tlp_count(port));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 0);
        assert_eq!(*results[0].1.as_ref().unwrap(), 1);
        assert!(matches!(results[1], (2, Err(PlxError::ShortRead { count: 0 }))));
        assert_eq!(*results[2].1.as_ref().unwrap(), 5);
    }

    #[test]
    fn all_ports_scan() {
        let mut t = MockTransport::new();
        let results = switch(&mut t).for_all_ports(|s, port| s.bad_dllp_count(port));
        assert_eq!(results.len(), NUM_PORTS);
        assert!(results.iter().all(|(_, r)| r.is_err()));
    }
}
