//! Error types for mdreduce-device operations
//!
//! Covers launch validation, scratch allocation, host transfers and faults
//! raised by device code while a kernel runs.

use thiserror::Error;

/// Result type alias for mdreduce-device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur during device operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Invalid kernel configuration
    #[error("Invalid launch config: {0}")]
    InvalidLaunchConfig(String),

    /// Scratch allocation exceeds device memory
    #[error("Device out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Requested bytes
        requested: usize,
        /// Bytes still available
        available: usize,
    },

    /// Host/device transfer error
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Device code faulted while the kernel was running
    #[error("Device execution fault in block {block}: {message}")]
    ExecutionFault {
        /// Ordinal of the first block observed to fault
        block: u32,
        /// Panic payload or fault description
        message: String,
    },
}
