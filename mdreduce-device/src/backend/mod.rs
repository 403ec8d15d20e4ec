//! Device Abstraction
//!
//! The narrow interface the reduction engine consumes: scratch allocation,
//! device-to-host copies, kernel launch and occupancy advice.

mod sim;

pub use sim::SimDevice;

use crate::driver::{DeviceProps, LaunchConfig};
use crate::error::Result;
use crate::kernel::BlockKernel;
use crate::memory::{DeviceBuffer, Word};
use crate::occupancy;

/// Accelerator trait for the reduction engine
pub trait Device: Send + Sync {
    /// Device name
    fn name(&self) -> &str {
        &self.props().name
    }

    /// Static device properties
    fn props(&self) -> &DeviceProps;

    /// Allocate zero-filled device-global scratch of `words` words
    ///
    /// # Errors
    ///
    /// Returns `Err(DeviceError::OutOfMemory)` if the request exceeds device memory.
    fn allocate_scratch<W: Word>(&self, words: usize) -> Result<DeviceBuffer<W>>;

    /// Copy a device buffer into host memory
    ///
    /// # Errors
    ///
    /// Returns `Err(DeviceError::Transfer)` if `dst` and `src` differ in size.
    fn device_to_host_copy<W: Word>(&self, dst: &mut [u8], src: &DeviceBuffer<W>) -> Result<()>;

    /// Run `kernel` on every block of `config` and wait for completion
    ///
    /// # Errors
    ///
    /// Returns `Err(DeviceError::InvalidLaunchConfig)` before any block runs if
    /// the configuration breaks a device limit, and
    /// `Err(DeviceError::ExecutionFault)` if device code faulted.
    fn launch<K: BlockKernel>(&self, kernel: &K, config: &LaunchConfig) -> Result<()>;

    /// Block width with the best occupancy for a scratch cost, 0 if none fits
    fn suggest_block_size(&self, shared_cost: &dyn Fn(u32) -> usize) -> u32 {
        occupancy::suggest_block_size(self.props(), shared_cost)
    }

    /// Widest block that fits a scratch cost, 0 if none fits
    fn max_block_size(&self, shared_cost: &dyn Fn(u32) -> usize) -> u32 {
        occupancy::max_block_size(self.props(), shared_cost)
    }
}
