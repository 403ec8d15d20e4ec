//! Device Driver Surface
//!
//! Launch configuration and device properties shared by every backend.
//! Backends validate a [`LaunchConfig`] against their [`DeviceProps`]
//! before any block runs.

mod types;
pub use types::*;

use crate::error::{DeviceError, Result};

/// Check a launch configuration against device limits
///
/// # Errors
///
/// Returns `Err(DeviceError::InvalidLaunchConfig)` when the grid or block is
/// empty, the block is wider than `max_block_width`, or the block-local
/// scratch request exceeds `shared_mem_per_block`.
pub fn validate_launch(props: &DeviceProps, config: &LaunchConfig) -> Result<()> {
    if config.grid_blocks() == 0 {
        return Err(DeviceError::InvalidLaunchConfig(
            "grid has zero blocks".to_string(),
        ));
    }
    let lanes = config.block_lanes();
    if lanes == 0 {
        return Err(DeviceError::InvalidLaunchConfig(
            "block has zero lanes".to_string(),
        ));
    }
    if lanes > u64::from(props.max_block_width) {
        return Err(DeviceError::InvalidLaunchConfig(format!(
            "block of {} lanes exceeds device maximum {}",
            lanes, props.max_block_width
        )));
    }
    if config.shared_mem as usize > props.shared_mem_per_block {
        return Err(DeviceError::InvalidLaunchConfig(format!(
            "{} bytes of block scratch exceeds budget {}",
            config.shared_mem, props.shared_mem_per_block
        )));
    }
    Ok(())
}
