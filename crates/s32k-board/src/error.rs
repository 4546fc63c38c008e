//! Error types for board composition.

use std::path::PathBuf;

/// Errors that can occur while composing or configuring a board.
///
/// Every composition error is fatal: the composer never retries a failed
/// stage and never hands out a partially built board.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Two address ranges share at least one byte.
    #[error("region '{name}' (0x{base:08X}..0x{end:08X}) overlaps '{existing}' (0x{existing_base:08X}..0x{existing_end:08X})")]
    Overlap {
        name: String,
        base: u64,
        end: u64,
        existing: String,
        existing_base: u64,
        existing_end: u64,
    },

    /// Address arithmetic left the addressable range, or the range is empty.
    #[error("region '{name}' at 0x{base:X} with size 0x{size:X} does not fit the {limit_bits}-bit address space")]
    Range {
        name: String,
        base: u64,
        size: u64,
        limit_bits: u32,
    },

    /// A consumer referenced a clock that was never defined.
    #[error("unknown clock: '{name}'")]
    UnknownClock { name: String },

    /// A clock name was defined twice.
    #[error("clock '{name}' is already defined")]
    DuplicateClock { name: String },

    /// Invalid interrupt controller or machine parameters.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    /// A wiring step ran before the component it depends on was committed.
    #[error("not ready: {detail}")]
    NotReady { detail: String },

    /// The firmware image exceeds the capacity of its target flash region.
    #[error("firmware image of {size} bytes exceeds flash capacity of {capacity} bytes")]
    ImageTooLarge { size: u64, capacity: u64 },

    /// Interrupt input line index outside the controller.
    #[error("interrupt line {line} out of range (controller has {count} lines)")]
    LineOutOfRange { line: u32, count: u32 },

    /// Interrupt input line already driven by another device.
    #[error("interrupt line {line} already connected to '{owner}'")]
    LineInUse { line: u32, owner: String },

    /// Access to addresses not covered by a single region.
    #[error("unmapped access at 0x{addr:08X} ({len} bytes)")]
    Unmapped { addr: u64, len: u64 },

    /// Guest-style write to a ROM region.
    #[error("write to read-only region '{region}' at 0x{addr:08X}")]
    ReadOnly { region: String, addr: u64 },

    /// Access to a reserved region that has no storage.
    #[error("region '{region}' is reserved and has no backing storage")]
    NotBacked { region: String },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading configuration or writing to a character sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file not found.
    #[error("configuration file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },
}

impl BoardError {
    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        BoardError::InvalidConfig {
            detail: detail.into(),
        }
    }

    pub(crate) fn not_ready(detail: impl Into<String>) -> Self {
        BoardError::NotReady {
            detail: detail.into(),
        }
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
