//! Serial EEPROM image format.
//!
//! At power-up the switch reads a register-write stream from its serial
//! EEPROM and replays it in order before link training. Layout (PEX8734
//! data book, "Serial EEPROM Data Format"):
//!
//! | Offset | Size | Meaning |
//! |--------|------|---------|
//! | 0x00 | 1 | Validation signature, always `0x5A` |
//! | 0x01 | 1 | Bit 7 enables CRC checking; `0x00` = disabled |
//! | 0x02 | 2 | Register byte count, little-endian (`6 × entries`) |
//! | 0x04 | 6·N | Entries: register address (LE u16) + data (LE u32) |
//! | end | 4 | CRC (zero while CRC checking is disabled) |
//!
//! Register addresses are encoded with
//! [`encode_stream_address`](crate::address::encode_stream_address).

/// Validation signature at offset 0.
pub const SIGNATURE: u8 = 0x5A;

/// Header byte 1 with CRC checking disabled.
pub const CRC_DISABLED: u8 = 0x00;

/// Header byte 1 bit that would enable CRC checking.
pub const CRC_ENABLE_BIT: u8 = 1 << 7;

/// Header length in bytes.
pub const HEADER_LEN: usize = 4;

/// Bytes per register entry: 2 address + 4 data.
pub const ENTRY_LEN: usize = 6;

/// Trailing CRC length in bytes.
pub const CRC_LEN: usize = 4;

/// Largest entry count whose byte count still fits the 16-bit header field.
pub const MAX_ENTRIES: usize = u16::MAX as usize / ENTRY_LEN;

/// Total image length for `entries` register writes.
#[must_use]
pub const fn image_len(entries: usize) -> usize {
    HEADER_LEN + entries * ENTRY_LEN + CRC_LEN
}

/// Page geometry of the AT24C02 configuration EEPROM.
pub mod at24c02 {
    /// Write page size in bytes; a page write must not cross this boundary.
    pub const PAGE_SIZE: usize = 8;
    /// Write-cycle time to wait after each page write (ms).
    pub const WRITE_CYCLE_MS: u64 = 10;
    /// Addressable bytes.
    pub const CAPACITY: usize = 256;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_limit_matches_byte_count_field() {
        assert_eq!(MAX_ENTRIES, 10_922);
        assert!(MAX_ENTRIES * ENTRY_LEN <= usize::from(u16::MAX));
        assert!((MAX_ENTRIES + 1) * ENTRY_LEN > usize::from(u16::MAX));
    }

    #[test]
    fn empty_image_is_header_plus_crc() {
        assert_eq!(image_len(0), 8);
        assert_eq!(image_len(2), 20);
    }
}
