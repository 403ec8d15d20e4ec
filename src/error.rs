//! Error types for mdreduce operations

use mdreduce_device::DeviceError;
use thiserror::Error;

/// Result type for mdreduce operations
pub type Result<T> = std::result::Result<T, ReduceError>;

/// Errors that can occur while preparing or running a reduction
///
/// Everything except [`ReduceError::Device`] is a configuration error,
/// reported before any device work is issued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReduceError {
    /// No block width fits the reduction value in block scratch
    #[error("could not find a valid tile size: {0}")]
    NoValidTileSize(String),

    /// Tile element count exceeds what one block can host
    #[error("tile of {elements} elements exceeds the maximum tile size product {max}")]
    TileTooLarge {
        /// Elements per tile
        elements: usize,
        /// Largest block width available for this reducer
        max: usize,
    },

    /// Launch bounds cap the block below the tile element count
    #[error("block width limit {limit} is below the tile element count {elements}")]
    BlockWidthBelowTile {
        /// Configured block width limit
        limit: u32,
        /// Elements per tile
        elements: usize,
    },

    /// Reducer declares a value size that differs from its value type
    #[error("reducer declares {declared}-byte values, value type is {actual} bytes")]
    ValueSizeMismatch {
        /// Size reported by `Reducer::value_size`
        declared: usize,
        /// Size of `Reducer::Value`
        actual: usize,
    },

    /// Malformed work domain
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    /// Device allocation, transfer or execution failure
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}
