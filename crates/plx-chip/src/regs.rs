//! Register map subset and bitfield schemas.
//!
//! Offsets are byte offsets into a port's configuration space. Bitfield
//! layouts follow the PEX8619 data book, chapter 14:
//!
//! ```text
//! 0x078  Link Control / Status            Register 14-29
//! 0x098  Link Control / Status 2          Register 14-34
//! 0x1DC  Debug Control                    Register 14-64
//! ```
//!
//! A schema is a static list of [`Field`]s. Decoding (and its error
//! handling) lives in the driver crate; this module only describes layouts.

// ── Per-port registers ───────────────────────────────────────────────────────

/// PCI Express Link Control / Link Status.
pub const LINK_STATUS: u32 = 0x078;
/// PCI Express Link Control 2 / Link Status 2.
pub const LINK_STATUS_CONTROL2: u32 = 0x098;
/// VC0 resource status; bit 17 is "VC0 negotiation pending".
pub const VC0_RESOURCE_STATUS: u32 = 0x160;
/// Bad TLP counter.
pub const BAD_TLP_COUNT: u32 = 0x1E8;
/// Bad DLLP counter.
pub const BAD_DLLP_COUNT: u32 = 0x1EC;

/// Bit position of "VC0 negotiation pending" in [`VC0_RESOURCE_STATUS`].
pub const VC0_NEGOTIATION_PENDING_BIT: u32 = 17;

// ── Station / device-wide registers (read through port 0) ────────────────────

/// Debug Control.
pub const DEBUG_CONTROL: u32 = 0x1DC;
/// Receiver-detected status, lanes 0–7 in bits 24..=31.
pub const RECEIVER_DETECT_LOW: u32 = 0x200;
/// Receiver-detected status, lanes 8–15 in bits 24..=31.
pub const RECEIVER_DETECT_HIGH: u32 = 0x204;
/// Lane-up status, one bit per lane.
pub const LANES_UP: u32 = 0x1F4;
/// Port configuration strap readback; `portcfg` in bits 0..=3.
pub const PORT_CONFIG: u32 = 0x574;
/// Port enable status, one bit per port.
pub const PORTS_ENABLED: u32 = 0x668;
/// Negotiated width/speed for ports 0–7, six bits per port.
pub const LINK_WIDTH_SPEED_LOW: u32 = 0x66C;
/// Negotiated width/speed for ports 8–15, six bits per port.
pub const LINK_WIDTH_SPEED_HIGH: u32 = 0x670;
/// Receive error counters, lanes 0, 2, 4, 6.
pub const RX_ERRORS_EVEN_LOW: u32 = 0xB88;
/// Receive error counters, lanes 1, 3, 5, 7.
pub const RX_ERRORS_ODD_LOW: u32 = 0xB8C;
/// Receive error counters, lanes 8, 10, 12, 14.
pub const RX_ERRORS_EVEN_HIGH: u32 = 0xB90;
/// Receive error counters, lanes 9, 11, 13, 15.
pub const RX_ERRORS_ODD_HIGH: u32 = 0xB94;

/// Mask applied to [`PORT_CONFIG`] to extract the `portcfg` code.
pub const PORT_CONFIG_MASK: u32 = 0xF;

// ── EEPROM stream targets (PEX8732 / PEX8734) ────────────────────────────────

/// Station lane-reversal / port configuration control (per station).
pub const STATION_CONTROL: u32 = 0x220;
/// Port disable / RX termination control.
pub const PORT_DISABLE: u32 = 0x208;
/// Port clock enable.
pub const PORT_CLOCK_ENABLE: u32 = 0x30C;
/// Power-on reset value of [`PORT_CLOCK_ENABLE`].
pub const PORT_CLOCK_ENABLE_POR: u32 = 0x0100_00FF;
/// Port configuration (lane partitioning).
pub const PORT_CONFIGURATION: u32 = 0x300;
/// Upstream / NT port selection.
pub const UPSTREAM_NT_SELECT: u32 = 0x360;
/// PCI command register of an NT interface (BAR0/1 setup).
pub const NT_COMMAND: u32 = 0x004;

/// Number of ports described by the per-port status registers.
pub const NUM_PORTS: usize = 16;
/// Number of lanes described by the per-lane status registers.
pub const NUM_LANES: usize = 16;

// ── Schemas ──────────────────────────────────────────────────────────────────

/// PCIe link speed as encoded by the Link Status registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkSpeed {
    /// Target speed not programmed (Link Control 2 code 0; reads as −1).
    NotSet,
    /// No link trained (Link Status code 0).
    Down,
    /// 2.5 GT/s.
    Gen1,
    /// 5.0 GT/s.
    Gen2,
}

impl LinkSpeed {
    /// Speed in Gbit/s per lane, with `NotSet` as the −1 sentinel.
    #[must_use]
    pub const fn gbps(self) -> f32 {
        match self {
            Self::NotSet => -1.0,
            Self::Down => 0.0,
            Self::Gen1 => 2.5,
            Self::Gen2 => 5.0,
        }
    }
}

impl std::fmt::Display for LinkSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.gbps())
    }
}

/// Current Link Speed table (Link Status bits 16..=19).
pub const CURRENT_LINK_SPEEDS: &[LinkSpeed] = &[LinkSpeed::Down, LinkSpeed::Gen1, LinkSpeed::Gen2];

/// Target Link Speed table (Link Control 2 bits 0..=3).
pub const TARGET_LINK_SPEEDS: &[LinkSpeed] = &[LinkSpeed::NotSet, LinkSpeed::Gen1, LinkSpeed::Gen2];

/// Negotiated speed bit of the station width/speed registers.
pub const NEGOTIATED_SPEEDS: &[LinkSpeed] = &[LinkSpeed::Gen1, LinkSpeed::Gen2];

/// Negotiated width code → lane count.
pub const LANE_COUNTS: &[u8] = &[1, 2, 4, 8];

/// Lookup table carried by an enumerated field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldTable {
    /// Code indexes a link speed.
    LinkSpeed(&'static [LinkSpeed]),
    /// Code indexes a lane count.
    Lanes(&'static [u8]),
}

impl FieldTable {
    /// Number of codes the table defines.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::LinkSpeed(t) => t.len(),
            Self::Lanes(t) => t.len(),
        }
    }

    /// True if the table defines no codes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named bitfield of a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    /// Data book name.
    pub name: &'static str,
    /// Bit position of the field's LSB.
    pub shift: u8,
    /// Field width in bits (1..=32).
    pub width: u8,
    /// Optional code → value table.
    pub table: Option<FieldTable>,
}

impl Field {
    /// Plain integer field.
    #[must_use]
    pub const fn bits(name: &'static str, shift: u8, width: u8) -> Self {
        Self { name, shift, width, table: None }
    }

    /// Single-bit flag.
    #[must_use]
    pub const fn flag(name: &'static str, shift: u8) -> Self {
        Self::bits(name, shift, 1)
    }

    /// Enumerated field.
    #[must_use]
    pub const fn table(name: &'static str, shift: u8, width: u8, table: FieldTable) -> Self {
        Self { name, shift, width, table: Some(table) }
    }

    /// Mask of `width` low bits.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Raw field bits of `value`.
    #[must_use]
    pub const fn extract(&self, value: u32) -> u32 {
        (value >> self.shift) & self.mask()
    }
}

/// A register and its field layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterSchema {
    /// Register name.
    pub name: &'static str,
    /// Byte offset within the port's configuration space.
    pub offset: u32,
    /// Data book reference.
    pub reference: &'static str,
    /// Fields, in ascending bit order.
    pub fields: &'static [Field],
}

impl RegisterSchema {
    /// Look up a field by its data book name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Debug Control field layout.
#[allow(missing_docs)] // constant names mirror the data book field names
pub mod debug_control {
    use super::Field;

    pub const UPCFG_TIMER_ENABLE: Field = Field::flag("UPCFG Timer Enable", 4);
    pub const SMBUS_ENABLE: Field = Field::flag("SMBus Enable", 5);
    pub const NT_P2P_ENABLE: Field = Field::flag("NT P2P Enable", 6);
    pub const UPSTREAM_PORT_ID: Field = Field::bits("Upstream Port ID", 8, 4);
    pub const INTERRUPT_FENCING_MODE: Field = Field::bits("Interrupt Fencing Mode", 12, 2);
    pub const HW_SW_CONFIG_MODE_CONTROL: Field =
        Field::flag("Hardware/Software Configuration Mode Control", 15);
    pub const UPSTREAM_HOT_RESET_CONTROL: Field = Field::flag("Upstream Hot Reset Control", 16);
    pub const DISABLE_EEPROM_LOAD_ON_HOT_RESET: Field =
        Field::flag("Disable Serial EEPROM Load on Hot Reset", 17);
    pub const NT_MODE_ENABLE: Field = Field::flag("NT Mode Enable", 18);
    pub const NT_PORT_DL_DOWN_PROPAGATION_DISABLE: Field =
        Field::flag("NT Port DL_Down Propagation Disable", 19);
    pub const UPSTREAM_PORT_DL_DOWN_PROPAGATION_DISABLE: Field =
        Field::flag("Upstream Port DL_Down Propagation Disable", 20);
    pub const CUT_THRU_ENABLE: Field = Field::flag("Cut-Thru Enable", 21);
    pub const NT_PORT_NUMBER: Field = Field::bits("NT Port Number", 24, 4);
    pub const VIRTUAL_INTERFACE_ACCESS_ENABLE: Field =
        Field::flag("Virtual Interface Access Enable", 28);
    pub const LINK_INTERFACE_ACCESS_ENABLE: Field = Field::flag("Link Interface Access Enable", 29);
    pub const INHIBIT_EEPROM_NT_LINK_LOAD_ON_HOT_RESET: Field =
        Field::flag("Inhibit EEPROM NT-Link Load on Hot Reset", 30);
    pub const LOAD_ONLY_EEPROM_NT_LINK_ON_HOT_RESET: Field =
        Field::flag("Load Only EEPROM NT-Link on Hot Reset", 31);

    pub const FIELDS: &[Field] = &[
        UPCFG_TIMER_ENABLE,
        SMBUS_ENABLE,
        NT_P2P_ENABLE,
        UPSTREAM_PORT_ID,
        INTERRUPT_FENCING_MODE,
        HW_SW_CONFIG_MODE_CONTROL,
        UPSTREAM_HOT_RESET_CONTROL,
        DISABLE_EEPROM_LOAD_ON_HOT_RESET,
        NT_MODE_ENABLE,
        NT_PORT_DL_DOWN_PROPAGATION_DISABLE,
        UPSTREAM_PORT_DL_DOWN_PROPAGATION_DISABLE,
        CUT_THRU_ENABLE,
        NT_PORT_NUMBER,
        VIRTUAL_INTERFACE_ACCESS_ENABLE,
        LINK_INTERFACE_ACCESS_ENABLE,
        INHIBIT_EEPROM_NT_LINK_LOAD_ON_HOT_RESET,
        LOAD_ONLY_EEPROM_NT_LINK_ON_HOT_RESET,
    ];
}

/// Link Status field layout.
#[allow(missing_docs)] // constant names mirror the data book field names
pub mod link_status {
    use super::{Field, FieldTable, CURRENT_LINK_SPEEDS};

    pub const ASPM: Field = Field::bits("ASPM", 0, 2);
    pub const LINK_DISABLE: Field = Field::flag("Link Disable", 4);
    pub const COMMON_CLOCK_CONFIGURATION: Field = Field::flag("Common Clock Configuration", 6);
    pub const EXTENDED_SYNC: Field = Field::flag("Extended Sync", 7);
    pub const CLOCK_POWER_MANAGEMENT_ENABLE: Field =
        Field::flag("Clock Power Management Enable", 8);
    pub const LINK_BANDWIDTH_MANAGEMENT_INTERRUPT_ENABLE: Field =
        Field::flag("Link Bandwidth Management Interrupt Enable", 10);
    pub const LINK_AUTONOMOUS_BANDWIDTH_INTERRUPT_ENABLE: Field =
        Field::flag("Link Autonomous Bandwidth Interrupt Enable", 11);
    pub const CURRENT_LINK_SPEED: Field = Field::table(
        "Current Link Speed",
        16,
        4,
        FieldTable::LinkSpeed(CURRENT_LINK_SPEEDS),
    );
    pub const NEGOTIATED_LINK_WIDTH: Field = Field::bits("Negotiated Link Width", 20, 6);
    pub const LINK_TRAINING: Field = Field::flag("Link Training", 27);
    pub const SLOT_CLOCK_CONFIGURATION: Field = Field::flag("Slot Clock Configuration", 28);
    pub const DATA_LINK_LAYER_LINK_ACTIVE: Field = Field::flag("Data Link Layer Link Active", 29);
    pub const LINK_BANDWIDTH_MANAGEMENT_STATUS: Field =
        Field::flag("Link Bandwidth Management Status", 30);
    pub const LINK_AUTONOMOUS_BANDWIDTH_STATUS: Field =
        Field::flag("Link Autonomous Bandwidth Status", 31);

    pub const FIELDS: &[Field] = &[
        ASPM,
        LINK_DISABLE,
        COMMON_CLOCK_CONFIGURATION,
        EXTENDED_SYNC,
        CLOCK_POWER_MANAGEMENT_ENABLE,
        LINK_BANDWIDTH_MANAGEMENT_INTERRUPT_ENABLE,
        LINK_AUTONOMOUS_BANDWIDTH_INTERRUPT_ENABLE,
        CURRENT_LINK_SPEED,
        NEGOTIATED_LINK_WIDTH,
        LINK_TRAINING,
        SLOT_CLOCK_CONFIGURATION,
        DATA_LINK_LAYER_LINK_ACTIVE,
        LINK_BANDWIDTH_MANAGEMENT_STATUS,
        LINK_AUTONOMOUS_BANDWIDTH_STATUS,
    ];
}

/// Link Status and Control 2 field layout.
#[allow(missing_docs)] // constant names mirror the data book field names
pub mod link_status_control2 {
    use super::{Field, FieldTable, TARGET_LINK_SPEEDS};

    pub const TARGET_LINK_SPEED: Field = Field::table(
        "Target Link Speed",
        0,
        4,
        FieldTable::LinkSpeed(TARGET_LINK_SPEEDS),
    );
    pub const ENTER_COMPLIANCE: Field = Field::flag("Enter Compliance", 4);
    pub const SELECTABLE_DE_EMPHASIS: Field = Field::flag("Selectable De-Emphasis", 6);
    pub const TRANSMIT_MARGIN: Field = Field::bits("Transmit Margin", 7, 2);
    pub const ENTER_MODIFIED_COMPLIANCE: Field = Field::flag("Enter Modified Compliance", 10);
    pub const COMPLIANCE_SOS: Field = Field::flag("Compliance SOS", 11);
    pub const COMPLIANCE_DE_EMPHASIS: Field = Field::flag("Compliance De-Emphasis", 12);
    pub const CURRENT_DE_EMPHASIS_LEVEL: Field = Field::flag("Current De-Emphasis Level", 16);

    pub const FIELDS: &[Field] = &[
        TARGET_LINK_SPEED,
        ENTER_COMPLIANCE,
        SELECTABLE_DE_EMPHASIS,
        TRANSMIT_MARGIN,
        ENTER_MODIFIED_COMPLIANCE,
        COMPLIANCE_SOS,
        COMPLIANCE_DE_EMPHASIS,
        CURRENT_DE_EMPHASIS_LEVEL,
    ];
}

/// One six-bit slot of the station width/speed registers.
///
/// Slot `i` sits at bit `6 * i`; ports 0–7 in [`LINK_WIDTH_SPEED_LOW`],
/// ports 8–15 in [`LINK_WIDTH_SPEED_HIGH`].
pub mod port_width_speed {
    use super::{Field, FieldTable, LANE_COUNTS, NEGOTIATED_SPEEDS};

    /// Width of one port's slot in bits.
    pub const SLOT_BITS: u8 = 6;
    /// Ports per register.
    pub const PORTS_PER_REGISTER: usize = 8;

    /// Width code 0..=3 into lanes 1, 2, 4, 8.
    pub const WIDTH: Field = Field::table("Negotiated Width", 0, 3, FieldTable::Lanes(LANE_COUNTS));
    /// Speed bit: 2.5 or 5.0 GT/s.
    pub const SPEED: Field =
        Field::table("Negotiated Speed", 3, 1, FieldTable::LinkSpeed(NEGOTIATED_SPEEDS));

    /// Slot fields in bit order.
    pub const FIELDS: &[Field] = &[WIDTH, SPEED];
}

/// Debug Control register schema.
pub const DEBUG_CONTROL_SCHEMA: RegisterSchema = RegisterSchema {
    name: "Debug Control",
    offset: DEBUG_CONTROL,
    reference: "PEX8619 Databook Register 14-64 (1DCh)",
    fields: debug_control::FIELDS,
};

/// Link Status register schema.
pub const LINK_STATUS_SCHEMA: RegisterSchema = RegisterSchema {
    name: "Link Status",
    offset: LINK_STATUS,
    reference: "PEX8619 Databook Register 14-29 (78h)",
    fields: link_status::FIELDS,
};

/// Link Status and Control 2 register schema.
pub const LINK_STATUS_CONTROL2_SCHEMA: RegisterSchema = RegisterSchema {
    name: "Link Status and Control 2",
    offset: LINK_STATUS_CONTROL2,
    reference: "PEX8619 Databook Register 14-34 (98h)",
    fields: link_status_control2::FIELDS,
};

/// Per-port slot of the station width/speed registers.
pub const PORT_WIDTH_SPEED_SCHEMA: RegisterSchema = RegisterSchema {
    name: "Port Width and Speed",
    offset: LINK_WIDTH_SPEED_LOW,
    reference: "PEX8619 Databook (66Ch, 670h)",
    fields: port_width_speed::FIELDS,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_non_overlapping(schema: &RegisterSchema) {
        let mut seen = 0u32;
        for f in schema.fields {
            assert!(u32::from(f.shift) + u32::from(f.width) <= 32, "{} overflows", f.name);
            let bits = f.mask() << f.shift;
            assert_eq!(seen & bits, 0, "{} overlaps", f.name);
            seen |= bits;
        }
    }

    #[test]
    fn schemas_fit_and_do_not_overlap() {
        assert_non_overlapping(&DEBUG_CONTROL_SCHEMA);
        assert_non_overlapping(&LINK_STATUS_SCHEMA);
        assert_non_overlapping(&LINK_STATUS_CONTROL2_SCHEMA);
        assert_non_overlapping(&PORT_WIDTH_SPEED_SCHEMA);
    }

    #[test]
    fn schema_field_counts() {
        assert_eq!(DEBUG_CONTROL_SCHEMA.fields.len(), 17);
        assert_eq!(LINK_STATUS_SCHEMA.fields.len(), 14);
        assert_eq!(LINK_STATUS_CONTROL2_SCHEMA.fields.len(), 8);
    }

    #[test]
    fn debug_control_spans_bits_4_to_31() {
        let first = DEBUG_CONTROL_SCHEMA.fields.first().map(|f| f.shift);
        let last = DEBUG_CONTROL_SCHEMA.fields.last().map(|f| f.shift);
        assert_eq!(first, Some(4));
        assert_eq!(last, Some(31));
    }

    #[test]
    fn extract_masks_width() {
        let w = link_status::NEGOTIATED_LINK_WIDTH;
        assert_eq!(w.extract(0xFFFF_FFFF), 0x3F);
        assert_eq!(w.extract(0x0040_0000), 4);
        assert_eq!(Field::bits("all", 0, 32).extract(0xDEAD_BEEF), 0xDEAD_BEEF);
    }

    #[test]
    fn field_lookup_by_name() {
        let f = LINK_STATUS_SCHEMA.field("Negotiated Link Width");
        assert_eq!(f.map(|f| (f.shift, f.width)), Some((20, 6)));
        assert!(LINK_STATUS_SCHEMA.field("No Such Field").is_none());
    }

    #[test]
    fn speed_sentinels() {
        assert!((LinkSpeed::NotSet.gbps() + 1.0).abs() < f32::EPSILON);
        assert!(LinkSpeed::Down.gbps().abs() < f32::EPSILON);
        assert_eq!(LinkSpeed::Gen2.to_string(), "5");
    }
}
