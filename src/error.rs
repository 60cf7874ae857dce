//! SEDIMENT - Custom Error Types
//! Defines the error hierarchy for the append-only storage engine.

use thiserror::Error;

/// Custom Result type for the Sediment engine.
pub type Result<T> = std::result::Result<T, SedimentError>;

/// Error types for the Sediment storage engine.
#[derive(Error, Debug)]
pub enum SedimentError {
    /// I/O errors from file operations (segment open/read/write/seek).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key not found in the index.
    #[error("Key not found")]
    KeyNotFound,

    /// Data corruption detected while decoding a record
    /// (checksum mismatch or malformed length fields).
    #[error("Corrupted record: {0}")]
    Corrupted(String),

    /// A partial record at the end of a segment. Distinct from a clean
    /// end-of-segment boundary, which is not an error.
    #[error("Truncated record at end of segment")]
    Truncated,

    /// Startup replay failure. The index cannot be trusted past an
    /// unreadable record, so `open` fails outright.
    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation attempted against a closed store.
    #[error("Store is closed")]
    Closed,
}
