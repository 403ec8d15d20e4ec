//! Simulated Accelerator
//!
//! Runs kernels on the host. Blocks of a launch execute concurrently on the
//! rayon pool, so inter-block protocols race for real; lanes inside a block
//! execute phase by phase (see [`crate::kernel`]).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use tracing::{debug, instrument};

use super::Device;
use crate::driver::{validate_launch, DeviceProps, LaunchConfig};
use crate::error::{DeviceError, Result};
use crate::kernel::{BlockContext, BlockKernel};
use crate::memory::{DeviceBuffer, Word};

/// Host-side model of an accelerator
#[derive(Debug)]
pub struct SimDevice {
    props: DeviceProps,
    launches: AtomicU64,
    copies: AtomicU64,
}

impl SimDevice {
    /// Create a device with the given properties
    #[must_use]
    pub fn new(props: DeviceProps) -> Self {
        Self {
            props,
            launches: AtomicU64::new(0),
            copies: AtomicU64::new(0),
        }
    }

    /// Number of kernels launched so far
    #[must_use]
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    /// Number of device-to-host copies performed so far
    #[must_use]
    pub fn copy_count(&self) -> u64 {
        self.copies.load(Ordering::Relaxed)
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new(DeviceProps::default())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "device code panicked".to_string()
    }
}

impl Device for SimDevice {
    fn props(&self) -> &DeviceProps {
        &self.props
    }

    fn allocate_scratch<W: Word>(&self, words: usize) -> Result<DeviceBuffer<W>> {
        let requested = words.saturating_mul(W::BYTES);
        if requested > self.props.global_mem_bytes {
            return Err(DeviceError::OutOfMemory {
                requested,
                available: self.props.global_mem_bytes,
            });
        }
        Ok(DeviceBuffer::zeroed(words))
    }

    fn device_to_host_copy<W: Word>(&self, dst: &mut [u8], src: &DeviceBuffer<W>) -> Result<()> {
        src.copy_to_bytes(dst)?;
        self.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[instrument(level = "debug", skip(self, kernel), fields(device = %self.props.name))]
    fn launch<K: BlockKernel>(&self, kernel: &K, config: &LaunchConfig) -> Result<()> {
        validate_launch(&self.props, config)?;

        // Both products were bounded by validate_launch
        let grid = u32::try_from(config.grid_blocks())
            .map_err(|_| DeviceError::InvalidLaunchConfig("grid too large".to_string()))?;
        let block = u32::try_from(config.block_lanes())
            .map_err(|_| DeviceError::InvalidLaunchConfig("block too large".to_string()))?;
        let shared = config.shared_mem as usize;

        self.launches.fetch_add(1, Ordering::Relaxed);
        debug!(grid, block, shared, lanes = config.total_threads(), "launching kernel");

        (0..grid).into_par_iter().try_for_each(|block_idx| {
            let mut ctx = BlockContext::new(block_idx, grid, block, shared);
            panic::catch_unwind(AssertUnwindSafe(|| kernel.run_block(&mut ctx))).map_err(
                |payload| DeviceError::ExecutionFault {
                    block: block_idx,
                    message: panic_message(payload.as_ref()),
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct CountBlocks {
        blocks: AtomicU32,
        lanes: AtomicU32,
    }

    impl BlockKernel for CountBlocks {
        fn run_block(&self, block: &mut BlockContext) {
            self.blocks.fetch_add(1, Ordering::Relaxed);
            for _ in block.lanes() {
                self.lanes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    struct FaultInBlock(u32);

    impl BlockKernel for FaultInBlock {
        fn run_block(&self, block: &mut BlockContext) {
            if block.block_idx() == self.0 {
                panic!("illegal address");
            }
        }
    }

    #[test]
    fn test_launch_runs_every_block() {
        let device = SimDevice::default();
        let kernel = CountBlocks {
            blocks: AtomicU32::new(0),
            lanes: AtomicU32::new(0),
        };
        device.launch(&kernel, &LaunchConfig::grid_1d(13, 64)).unwrap();
        assert_eq!(kernel.blocks.load(Ordering::Relaxed), 13);
        assert_eq!(kernel.lanes.load(Ordering::Relaxed), 13 * 64);
        assert_eq!(device.launch_count(), 1);
    }

    #[test]
    fn test_launch_rejects_invalid_config() {
        let device = SimDevice::new(DeviceProps::hip_like().with_max_block_width(128));
        let kernel = CountBlocks {
            blocks: AtomicU32::new(0),
            lanes: AtomicU32::new(0),
        };
        let err = device
            .launch(&kernel, &LaunchConfig::grid_1d(1, 256))
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidLaunchConfig(_)));
        assert_eq!(kernel.blocks.load(Ordering::Relaxed), 0);
        assert_eq!(device.launch_count(), 0);
    }

    #[test]
    fn test_device_panic_becomes_execution_fault() {
        let device = SimDevice::default();
        let err = device
            .launch(&FaultInBlock(2), &LaunchConfig::grid_1d(4, 32))
            .unwrap_err();
        match err {
            DeviceError::ExecutionFault { block, message } => {
                assert_eq!(block, 2);
                assert_eq!(message, "illegal address");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_allocate_scratch_is_zeroed() {
        let device = SimDevice::default();
        let buffer: DeviceBuffer<u16> = device.allocate_scratch(10).unwrap();
        assert_eq!(buffer.len(), 10);
        assert!(buffer.to_words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_allocate_scratch_out_of_memory() {
        let device = SimDevice::new(DeviceProps::hip_like().with_global_mem_bytes(64));
        let err = device.allocate_scratch::<u32>(17).unwrap_err();
        assert_eq!(
            err,
            DeviceError::OutOfMemory {
                requested: 68,
                available: 64
            }
        );
    }

    #[test]
    fn test_device_to_host_copy_counts() {
        let device = SimDevice::default();
        let buffer: DeviceBuffer<u32> = device.allocate_scratch(1).unwrap();
        buffer.store(0, 0x0102_0304);
        let mut host = [0u8; 4];
        device.device_to_host_copy(&mut host, &buffer).unwrap();
        assert_eq!(u32::from_ne_bytes(host), 0x0102_0304);
        assert_eq!(device.copy_count(), 1);
    }
}
