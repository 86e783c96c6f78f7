//! Error types for depth storage.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DepthError>;

#[derive(Debug, Error)]
pub enum DepthError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Stored checksum does not match the payload.
    #[error("CRC mismatch: file={expected:#x}, calc={actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Snapshots only travel through the flatten/regroup path, never one row at a time.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("file does not start with a header frame")]
    MissingHeader,

    #[error("header frame found inside the row stream")]
    UnexpectedHeader,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("instrument mismatch: expected {expected}, file has {found}")]
    InstrumentMismatch { expected: String, found: String },

    #[error("recorder channel closed")]
    RecorderClosed,

    #[error("recorder thread panicked")]
    RecorderPanicked,
}
