//! Bitfield decoding
//!
//! Two views of the same schemas from `plx_chip::regs`:
//!
//! - [`decode`] walks any [`RegisterSchema`] and returns the fields by name,
//!   which is what report printers want.
//! - Typed records ([`DebugControl`], [`LinkStatus`], [`LinkStatusControl2`],
//!   [`PortLink`]) give code a fixed set of named, typed fields.
//!
//! Decoding only fails when a field indexes a lookup table shorter than the
//! field's range and the code falls outside it.

#![allow(clippy::cast_possible_truncation)]

use crate::error::{PlxError, Result};
use plx_chip::regs::{
    self, debug_control as dc, link_status as ls, link_status_control2 as lsc2, port_width_speed as pws, Field,
    FieldTable, LinkSpeed, RegisterSchema,
};

/// Value of one decoded field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Raw field bits
    Bits(u32),
    /// Link speed from a speed table
    Speed(LinkSpeed),
    /// Lane count from a width table
    Lanes(u8),
}

impl FieldValue {
    /// Raw bits, if this is a plain field
    pub const fn bits(self) -> Option<u32> {
        match self {
            Self::Bits(b) => Some(b),
            _ => None,
        }
    }
}

impl From<FieldValue> for f64 {
    fn from(v: FieldValue) -> Self {
        match v {
            FieldValue::Bits(b) => Self::from(b),
            FieldValue::Speed(s) => Self::from(s.gbps()),
            FieldValue::Lanes(l) => Self::from(l),
        }
    }
}

impl PartialEq<u32> for FieldValue {
    fn eq(&self, other: &u32) -> bool {
        self.bits() == Some(*other)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bits(b) => write!(f, "{b}"),
            Self::Speed(s) => write!(f, "{s}"),
            Self::Lanes(l) => write!(f, "{l}"),
        }
    }
}

/// Decode one field of `value`
///
/// # Errors
///
/// Returns `SchemaRange` if the field has a table and its code is past the end.
pub fn decode_field(value: u32, field: &Field) -> Result<FieldValue> {
    let code = field.extract(value);
    let Some(table) = field.table else {
        return Ok(FieldValue::Bits(code));
    };

    let out_of_range = || PlxError::SchemaRange {
        field: field.name,
        code,
        table_len: table.len(),
    };
    let index = usize::try_from(code).map_err(|_| out_of_range())?;
    match table {
        FieldTable::LinkSpeed(t) => t.get(index).copied().map(FieldValue::Speed),
        FieldTable::Lanes(t) => t.get(index).copied().map(FieldValue::Lanes),
    }
    .ok_or_else(out_of_range)
}

/// One named field of a decoded register
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedField {
    /// Data book field name
    pub name: &'static str,
    /// Decoded value
    pub value: FieldValue,
}

/// A register decoded against its schema
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRegister {
    /// Schema used
    pub schema: &'static RegisterSchema,
    /// Raw register value
    pub raw: u32,
    /// Fields in schema order
    pub fields: Vec<DecodedField>,
}

impl DecodedRegister {
    /// Field value by data book name
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value)
    }
}

impl std::ops::Index<&str> for DecodedRegister {
    type Output = FieldValue;

    fn index(&self, name: &str) -> &FieldValue {
        match self.fields.iter().find(|f| f.name == name) {
            Some(f) => &f.value,
            None => panic!("{} has no field named '{name}'", self.schema.name),
        }
    }
}

/// Decode every field of `value` against `schema`
///
/// # Errors
///
/// Returns `SchemaRange` for the first table-indexed field whose code is
/// outside its table.
pub fn decode(value: u32, schema: &'static RegisterSchema) -> Result<DecodedRegister> {
    let fields = schema
        .fields
        .iter()
        .map(|field| {
            decode_field(value, field).map(|value| DecodedField {
                name: field.name,
                value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DecodedRegister {
        schema,
        raw: value,
        fields,
    })
}

/// A register with a typed decoded form
pub trait RegisterRecord: Sized {
    /// Register layout
    const SCHEMA: &'static RegisterSchema;

    /// Decode a raw register value
    ///
    /// # Errors
    ///
    /// Returns `SchemaRange` if a table-indexed field is out of range.
    fn from_raw(value: u32) -> Result<Self>;
}

fn flag(value: u32, field: Field) -> bool {
    field.extract(value) != 0
}

fn small(value: u32, field: Field) -> u8 {
    debug_assert!(field.width <= 8);
    field.extract(value) as u8
}

fn speed(value: u32, field: &Field) -> Result<LinkSpeed> {
    match decode_field(value, field)? {
        FieldValue::Speed(s) => Ok(s),
        other => unreachable!("{} decoded as {other:?}", field.name),
    }
}

/// Debug Control register (0x1DC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
#[allow(missing_docs)] // field names follow the data book
pub struct DebugControl {
    pub upcfg_timer_enable: bool,
    pub smbus_enable: bool,
    pub nt_p2p_enable: bool,
    pub upstream_port_id: u8,
    pub interrupt_fencing_mode: u8,
    pub hw_sw_config_mode_control: bool,
    pub upstream_hot_reset_control: bool,
    pub disable_eeprom_load_on_hot_reset: bool,
    pub nt_mode_enable: bool,
    pub nt_port_dl_down_propagation_disable: bool,
    pub upstream_port_dl_down_propagation_disable: bool,
    pub cut_thru_enable: bool,
    pub nt_port_number: u8,
    pub virtual_interface_access_enable: bool,
    pub link_interface_access_enable: bool,
    pub inhibit_eeprom_nt_link_load_on_hot_reset: bool,
    pub load_only_eeprom_nt_link_on_hot_reset: bool,
}

impl RegisterRecord for DebugControl {
    const SCHEMA: &'static RegisterSchema = &regs::DEBUG_CONTROL_SCHEMA;

    fn from_raw(v: u32) -> Result<Self> {
        Ok(Self {
            upcfg_timer_enable: flag(v, dc::UPCFG_TIMER_ENABLE),
            smbus_enable: flag(v, dc::SMBUS_ENABLE),
            nt_p2p_enable: flag(v, dc::NT_P2P_ENABLE),
            upstream_port_id: small(v, dc::UPSTREAM_PORT_ID),
            interrupt_fencing_mode: small(v, dc::INTERRUPT_FENCING_MODE),
            hw_sw_config_mode_control: flag(v, dc::HW_SW_CONFIG_MODE_CONTROL),
            upstream_hot_reset_control: flag(v, dc::UPSTREAM_HOT_RESET_CONTROL),
            disable_eeprom_load_on_hot_reset: flag(v, dc::DISABLE_EEPROM_LOAD_ON_HOT_RESET),
            nt_mode_enable: flag(v, dc::NT_MODE_ENABLE),
            nt_port_dl_down_propagation_disable: flag(v, dc::NT_PORT_DL_DOWN_PROPAGATION_DISABLE),
            upstream_port_dl_down_propagation_disable: flag(v, dc::UPSTREAM_PORT_DL_DOWN_PROPAGATION_DISABLE),
            cut_thru_enable: flag(v, dc::CUT_THRU_ENABLE),
            nt_port_number: small(v, dc::NT_PORT_NUMBER),
            virtual_interface_access_enable: flag(v, dc::VIRTUAL_INTERFACE_ACCESS_ENABLE),
            link_interface_access_enable: flag(v, dc::LINK_INTERFACE_ACCESS_ENABLE),
            inhibit_eeprom_nt_link_load_on_hot_reset: flag(v, dc::INHIBIT_EEPROM_NT_LINK_LOAD_ON_HOT_RESET),
            load_only_eeprom_nt_link_on_hot_reset: flag(v, dc::LOAD_ONLY_EEPROM_NT_LINK_ON_HOT_RESET),
        })
    }
}

/// PCIe Link Control / Link Status register (0x78)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
#[allow(missing_docs)] // field names follow the data book
pub struct LinkStatus {
    pub aspm: u8,
    pub link_disable: bool,
    pub common_clock_configuration: bool,
    pub extended_sync: bool,
    pub clock_power_management_enable: bool,
    pub link_bandwidth_management_interrupt_enable: bool,
    pub link_autonomous_bandwidth_interrupt_enable: bool,
    pub current_link_speed: LinkSpeed,
    pub negotiated_link_width: u8,
    pub link_training: bool,
    pub slot_clock_configuration: bool,
    pub data_link_layer_link_active: bool,
    pub link_bandwidth_management_status: bool,
    pub link_autonomous_bandwidth_status: bool,
}

impl RegisterRecord for LinkStatus {
    const SCHEMA: &'static RegisterSchema = &regs::LINK_STATUS_SCHEMA;

    fn from_raw(v: u32) -> Result<Self> {
        Ok(Self {
            aspm: small(v, ls::ASPM),
            link_disable: flag(v, ls::LINK_DISABLE),
            common_clock_configuration: flag(v, ls::COMMON_CLOCK_CONFIGURATION),
            extended_sync: flag(v, ls::EXTENDED_SYNC),
            clock_power_management_enable: flag(v, ls::CLOCK_POWER_MANAGEMENT_ENABLE),
            link_bandwidth_management_interrupt_enable: flag(v, ls::LINK_BANDWIDTH_MANAGEMENT_INTERRUPT_ENABLE),
            link_autonomous_bandwidth_interrupt_enable: flag(v, ls::LINK_AUTONOMOUS_BANDWIDTH_INTERRUPT_ENABLE),
            current_link_speed: speed(v, &ls::CURRENT_LINK_SPEED)?,
            negotiated_link_width: small(v, ls::NEGOTIATED_LINK_WIDTH),
            link_training: flag(v, ls::LINK_TRAINING),
            slot_clock_configuration: flag(v, ls::SLOT_CLOCK_CONFIGURATION),
            data_link_layer_link_active: flag(v, ls::DATA_LINK_LAYER_LINK_ACTIVE),
            link_bandwidth_management_status: flag(v, ls::LINK_BANDWIDTH_MANAGEMENT_STATUS),
            link_autonomous_bandwidth_status: flag(v, ls::LINK_AUTONOMOUS_BANDWIDTH_STATUS),
        })
    }
}

/// PCIe Link Control 2 / Link Status 2 register (0x98)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)] // field names follow the data book
pub struct LinkStatusControl2 {
    pub target_link_speed: LinkSpeed,
    pub enter_compliance: bool,
    pub selectable_de_emphasis: bool,
    pub transmit_margin: u8,
    pub enter_modified_compliance: bool,
    pub compliance_sos: bool,
    pub compliance_de_emphasis: bool,
    pub current_de_emphasis_level: bool,
}

impl RegisterRecord for LinkStatusControl2 {
    const SCHEMA: &'static RegisterSchema = &regs::LINK_STATUS_CONTROL2_SCHEMA;

    fn from_raw(v: u32) -> Result<Self> {
        Ok(Self {
            target_link_speed: speed(v, &lsc2::TARGET_LINK_SPEED)?,
            enter_compliance: flag(v, lsc2::ENTER_COMPLIANCE),
            selectable_de_emphasis: flag(v, lsc2::SELECTABLE_DE_EMPHASIS),
            transmit_margin: small(v, lsc2::TRANSMIT_MARGIN),
            enter_modified_compliance: flag(v, lsc2::ENTER_MODIFIED_COMPLIANCE),
            compliance_sos: flag(v, lsc2::COMPLIANCE_SOS),
            compliance_de_emphasis: flag(v, lsc2::COMPLIANCE_DE_EMPHASIS),
            current_de_emphasis_level: flag(v, lsc2::CURRENT_DE_EMPHASIS_LEVEL),
        })
    }
}

/// Negotiated width and speed of one port, from a six-bit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLink {
    /// Lane count
    pub lanes: u8,
    /// Per-lane speed
    pub speed: LinkSpeed,
}

impl RegisterRecord for PortLink {
    const SCHEMA: &'static RegisterSchema = &regs::PORT_WIDTH_SPEED_SCHEMA;

    /// `v` is the slot already shifted down to bit 0.
    fn from_raw(v: u32) -> Result<Self> {
        let lanes = match decode_field(v, &pws::WIDTH)? {
            FieldValue::Lanes(l) => l,
            other => unreachable!("width decoded as {other:?}"),
        };
        Ok(Self {
            lanes,
            speed: speed(v, &pws::SPEED)?,
        })
    }
}

/// Decode the eight port slots packed into one width/speed register
///
/// # Errors
///
/// Returns `SchemaRange` if a slot carries a width code above 3.
pub fn decode_port_links(value: u32) -> Result<[PortLink; pws::PORTS_PER_REGISTER]> {
    let mut out = [PortLink {
        lanes: 0,
        speed: LinkSpeed::Down,
    }; pws::PORTS_PER_REGISTER];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = u32::from(pws::SLOT_BITS) * i as u32;
        *slot = PortLink::from_raw(value.checked_shr(shift).unwrap_or(0))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiated_width_matches_raw_bits() {
        // Sweep values with a valid Current Link Speed code (0..=2).
        let mut v: u32 = 0x1234_5678;
        for _ in 0..10_000 {
            v = v.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let value = (v & !(0xF << 16)) | ((v % 3) << 16);
            let d = decode(value, &regs::LINK_STATUS_SCHEMA).unwrap();
            assert_eq!(d["Negotiated Link Width"], (value >> 20) & 0x3F);
        }
    }

    #[test]
    fn current_link_speed_out_of_table() {
        let err = decode(3 << 16, &regs::LINK_STATUS_SCHEMA).unwrap_err();
        assert!(matches!(
            err,
            PlxError::SchemaRange {
                field: "Current Link Speed",
                code: 3,
                table_len: 3
            }
        ));
        assert!(LinkStatus::from_raw(0xF << 16).is_err());
    }

    #[test]
    fn link_status_fields() {
        // x4 at 5.0 GT/s, DL active, common clock, ASPM L0s+L1
        let raw = (1 << 29) | (4 << 20) | (2 << 16) | (1 << 6) | 0x3;
        let s = LinkStatus::from_raw(raw).unwrap();
        assert_eq!(s.aspm, 3);
        assert!(s.common_clock_configuration);
        assert_eq!(s.current_link_speed, LinkSpeed::Gen2);
        assert_eq!(s.negotiated_link_width, 4);
        assert!(s.data_link_layer_link_active);
        assert!(!s.link_training);

        let d = decode(raw, LinkStatus::SCHEMA).unwrap();
        assert_eq!(d.get("Current Link Speed"), Some(FieldValue::Speed(LinkSpeed::Gen2)));
        assert_eq!(d.fields.len(), 14);
    }

    #[test]
    fn link_speed_zero_means_down() {
        let s = LinkStatus::from_raw(0).unwrap();
        assert_eq!(s.current_link_speed, LinkSpeed::Down);
        assert!((f64::from(FieldValue::Speed(s.current_link_speed))).abs() < f64::EPSILON);
    }

    #[test]
    fn target_speed_sentinel() {
        let c = LinkStatusControl2::from_raw(0).unwrap();
        assert_eq!(c.target_link_speed, LinkSpeed::NotSet);
        assert!((c.target_link_speed.gbps() + 1.0).abs() < f32::EPSILON);

        let c = LinkStatusControl2::from_raw(0x1_0182).unwrap();
        assert_eq!(c.target_link_speed, LinkSpeed::Gen2);
        assert_eq!(c.transmit_margin, 3);
        assert!(c.current_de_emphasis_level);
        assert!(!c.enter_compliance);

        assert!(LinkStatusControl2::from_raw(0x3).is_err());
    }

    #[test]
    fn debug_control_fields() {
        // Upstream port 1, NT port 4, NT mode on, SMBus on, load-only NT link
        let raw = (1 << 31) | (4 << 24) | (1 << 18) | (1 << 8) | (1 << 5);
        let d = DebugControl::from_raw(raw).unwrap();
        assert_eq!(d.upstream_port_id, 1);
        assert_eq!(d.nt_port_number, 4);
        assert!(d.nt_mode_enable);
        assert!(d.smbus_enable);
        assert!(d.load_only_eeprom_nt_link_on_hot_reset);
        assert!(!d.cut_thru_enable);
        assert_eq!(DebugControl::from_raw(0).unwrap(), DebugControl::default());
    }

    #[test]
    fn debug_control_never_fails() {
        for raw in [0, u32::MAX, 0xA5A5_A5A5, 0x5A5A_5A5A] {
            assert!(decode(raw, DebugControl::SCHEMA).is_ok());
        }
        let all = decode(u32::MAX, DebugControl::SCHEMA).unwrap();
        assert_eq!(all["Upstream Port ID"], 0xF);
        assert_eq!(all["Interrupt Fencing Mode"], 0x3);
    }

    #[test]
    fn port_link_slots() {
        // port 0: x8 @ 5.0 (code 3 | speed bit); port 1: x1 @ 2.5; port 2: x4 @ 2.5
        let raw = 0b11 | (1 << 3) | (0 << 6) | (2 << 12);
        let links = decode_port_links(raw).unwrap();
        assert_eq!(links[0], PortLink { lanes: 8, speed: LinkSpeed::Gen2 });
        assert_eq!(links[1], PortLink { lanes: 1, speed: LinkSpeed::Gen1 });
        assert_eq!(links[2], PortLink { lanes: 4, speed: LinkSpeed::Gen1 });
    }

    #[test]
    fn port_link_width_out_of_table() {
        assert!(matches!(
            decode_port_links(0x4),
            Err(PlxError::SchemaRange { code: 4, table_len: 4, .. })
        ));
    }
}
