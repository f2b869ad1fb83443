//! Error types for PLX switch operations

use thiserror::Error;

/// Result type alias for PLX operations
pub type Result<T> = std::result::Result<T, PlxError>;

/// Errors that can occur while talking to a switch or building its EEPROM image
#[derive(Debug, Error)]
pub enum PlxError {
    /// Adapter or transport failure
    #[error("Transport error: {reason}")]
    Transport {
        /// Reason for failure
        reason: String,
    },

    /// I/O error from the underlying device file
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// The transport returned no data (or a negative status count)
    #[error("Short read: transport reported {count} bytes (is the slave address right?)")]
    ShortRead {
        /// Count reported by the transport
        count: i32,
    },

    /// The transport returned a byte count other than the register width
    #[error("Unexpected read length: got {count} bytes, expected {expected}")]
    UnexpectedLength {
        /// Count reported by the transport
        count: i32,
        /// Expected byte count
        expected: usize,
    },

    /// A decoded field code has no entry in its lookup table
    #[error("Field '{field}' code {code} is outside its table ({table_len} entries)")]
    SchemaRange {
        /// Field name
        field: &'static str,
        /// Raw field code
        code: u32,
        /// Number of table entries
        table_len: usize,
    },

    /// `portcfg` strap code has no known topology
    #[error("Unsupported port configuration code {code} (expected 0-8)")]
    UnsupportedPortConfig {
        /// Strap code
        code: u32,
    },

    /// EEPROM stream has more entries than the 16-bit byte count can describe
    #[error("EEPROM stream has {entries} entries; byte count exceeds 16 bits (max {max})")]
    EntryCountOverflow {
        /// Entry count
        entries: usize,
        /// Maximum entry count
        max: usize,
    },

    /// Port number does not fit the address encoding
    #[error("Port {port} out of range (max {max})")]
    PortOutOfRange {
        /// Requested port
        port: u8,
        /// Highest encodable port
        max: u8,
    },
}

impl PlxError {
    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create a short-read error
    pub const fn short_read(count: i32) -> Self {
        Self::ShortRead { count }
    }

    /// Create an unexpected-length error
    pub const fn unexpected_length(count: i32, expected: usize) -> Self {
        Self::UnexpectedLength { count, expected }
    }

    /// True for errors a retry could plausibly clear
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Io { .. } | Self::ShortRead { .. } | Self::UnexpectedLength { .. }
        )
    }
}
