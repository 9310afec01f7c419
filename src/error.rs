//! Error types for CSV reading

use thiserror::Error;

/// Result type alias for csvstream operations
pub type Result<T> = std::result::Result<T, CsvError>;

/// Errors that can occur while configuring or driving a CSV reader
#[derive(Error, Debug)]
pub enum CsvError {
    /// A public-contract argument was rejected (bad skip count, bad options)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// CSV readers consume their stream irreversibly and cannot rewind
    #[error("Reset is not supported by CSV readers")]
    ResetNotSupported,

    /// Failure while fetching the next physical line
    #[error("Read error: {0}")]
    ReadError(String),

    /// I/O error while opening a source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
