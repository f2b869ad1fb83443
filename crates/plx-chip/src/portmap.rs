//! Port-configuration strap topologies (PEX8619).
//!
//! The 4-bit `portcfg` strap, read back from [`crate::regs::PORT_CONFIG`],
//! selects how the 16 SerDes lanes are partitioned into ports. Each entry
//! below lists the lane width of port slots 0..=15; a zero means the slot
//! has no port in that configuration.
//!
//! ```text
//! code  ports
//! ────  ─────────────────────────────────────────────
//!  0    sixteen x1
//!  1    x4 + twelve x1
//!  2    x4 x4 + eight x1
//!  3    x4 x4 x4 + four x1
//!  4    x4 x4 x4 x4
//!  5    x8 + eight x1
//!  6    x8 x4 + four x1
//!  7    x8 x4 + four x1          (see note)
//!  8    x8 x8
//! ```
//!
//! The data book lists two layouts for code 7: `x8 x4 + four x1` and
//! `x8 x4 x4`. The first is used here; it is the layout the debug tooling
//! has always reported for this strap.

/// Number of port slots in a topology.
pub const PORT_SLOTS: usize = 16;

/// Lane width per port slot.
pub type PortMap = [u8; PORT_SLOTS];

/// Highest defined `portcfg` code.
pub const PORTCFG_MAX: u32 = 8;

const PORT_MAPS: [PortMap; 9] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [4, 1, 1, 1, 0, 1, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1],
    [4, 4, 1, 1, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1],
    [4, 4, 4, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 1],
    [4, 4, 4, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [8, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [8, 4, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 1],
    [8, 4, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 1],
    [8, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
];

/// Topology for `portcfg`, or `None` for codes above [`PORTCFG_MAX`].
#[must_use]
pub fn lookup(portcfg: u32) -> Option<&'static PortMap> {
    usize::try_from(portcfg).ok().and_then(|i| PORT_MAPS.get(i))
}

/// Total lanes assigned by a topology.
#[must_use]
pub fn total_lanes(map: &PortMap) -> u32 {
    map.iter().map(|&w| u32::from(w)).sum()
}

/// Number of ports present in a topology.
#[must_use]
pub fn port_count(map: &PortMap) -> usize {
    map.iter().filter(|&&w| w != 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_uses_all_sixteen_lanes() {
        for code in 0..=PORTCFG_MAX {
            let map = lookup(code).expect("defined code");
            assert_eq!(map.len(), PORT_SLOTS);
            assert_eq!(total_lanes(map), 16, "portcfg {code}");
            assert!(map.iter().all(|w| [0, 1, 4, 8].contains(w)));
        }
    }

    #[test]
    fn x4x4x4x4() {
        assert_eq!(lookup(4), Some(&[4, 4, 4, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(port_count(&PORT_MAPS[4]), 4);
    }

    #[test]
    fn code_7_uses_first_listed_layout() {
        let map = lookup(7).expect("defined code");
        assert_eq!(port_count(map), 6);
        assert_eq!(map[0], 8);
        assert_eq!(map[1], 4);
        assert_eq!(map[3], 1);
    }

    #[test]
    fn undefined_codes() {
        assert!(lookup(9).is_none());
        assert!(lookup(0xF).is_none());
        assert!(lookup(u32::MAX).is_none());
    }
}
