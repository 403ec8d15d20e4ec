//! Device Driver Types
//!
//! Launch geometry and the static properties of an accelerator.

/// Launch configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Grid dimensions (blocks)
    pub grid: (u32, u32, u32),
    /// Block dimensions (lanes)
    pub block: (u32, u32, u32),
    /// Block-local scratch memory per block (bytes)
    pub shared_mem: u32,
}

impl LaunchConfig {
    /// Create a 1D launch configuration with an explicit grid size
    #[must_use]
    pub const fn grid_1d(grid_blocks: u32, block_width: u32) -> Self {
        Self {
            grid: (grid_blocks, 1, 1),
            block: (block_width, 1, 1),
            shared_mem: 0,
        }
    }

    /// Set shared memory size
    #[must_use]
    pub const fn with_shared_mem(mut self, bytes: u32) -> Self {
        self.shared_mem = bytes;
        self
    }

    /// Number of blocks in the grid
    #[must_use]
    pub const fn grid_blocks(&self) -> u64 {
        self.grid.0 as u64 * self.grid.1 as u64 * self.grid.2 as u64
    }

    /// Number of lanes in one block
    #[must_use]
    pub const fn block_lanes(&self) -> u64 {
        self.block.0 as u64 * self.block.1 as u64 * self.block.2 as u64
    }

    /// Total lanes
    #[must_use]
    pub const fn total_threads(&self) -> u64 {
        self.grid_blocks() * self.block_lanes()
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            grid: (1, 1, 1),
            block: (256, 1, 1),
            shared_mem: 0,
        }
    }
}

/// Static properties of an accelerator
///
/// Mirrors what a driver reports through its attribute queries. The
/// simulated device honours every limit here when validating launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProps {
    /// Human readable device name
    pub name: String,
    /// Lanes per hardware execution group (warp / wavefront)
    pub warp_size: u32,
    /// Largest legal block width
    pub max_block_width: u32,
    /// Block-local scratch budget per block (bytes)
    pub shared_mem_per_block: usize,
    /// Block-local scratch available on one compute unit (bytes)
    pub shared_mem_per_cu: usize,
    /// Resident lane limit per compute unit
    pub max_threads_per_cu: u32,
    /// Resident block limit per compute unit
    pub max_blocks_per_cu: u32,
    /// Number of compute units
    pub compute_units: u32,
    /// Device-global memory (bytes)
    pub global_mem_bytes: usize,
}

impl DeviceProps {
    /// Properties of an AMD CDNA-class accelerator (64-wide wavefronts)
    #[must_use]
    pub fn hip_like() -> Self {
        Self {
            name: "sim-hip".to_string(),
            warp_size: 64,
            max_block_width: 1024,
            shared_mem_per_block: 64 * 1024,
            shared_mem_per_cu: 64 * 1024,
            max_threads_per_cu: 2048,
            max_blocks_per_cu: 32,
            compute_units: 110,
            global_mem_bytes: 64 << 30,
        }
    }

    /// Properties of an NVIDIA Volta-class accelerator (32-wide warps)
    #[must_use]
    pub fn cuda_like() -> Self {
        Self {
            name: "sim-cuda".to_string(),
            warp_size: 32,
            max_block_width: 1024,
            shared_mem_per_block: 48 * 1024,
            shared_mem_per_cu: 96 * 1024,
            max_threads_per_cu: 2048,
            max_blocks_per_cu: 32,
            compute_units: 80,
            global_mem_bytes: 16 << 30,
        }
    }

    /// Set the device name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the warp size
    #[must_use]
    pub fn with_warp_size(mut self, lanes: u32) -> Self {
        self.warp_size = lanes;
        self
    }

    /// Set the largest legal block width
    #[must_use]
    pub fn with_max_block_width(mut self, lanes: u32) -> Self {
        self.max_block_width = lanes;
        self
    }

    /// Set the per-block scratch budget
    #[must_use]
    pub fn with_shared_mem_per_block(mut self, bytes: usize) -> Self {
        self.shared_mem_per_block = bytes;
        self
    }

    /// Set the per-compute-unit scratch capacity
    #[must_use]
    pub fn with_shared_mem_per_cu(mut self, bytes: usize) -> Self {
        self.shared_mem_per_cu = bytes;
        self
    }

    /// Set the device-global memory size
    #[must_use]
    pub fn with_global_mem_bytes(mut self, bytes: usize) -> Self {
        self.global_mem_bytes = bytes;
        self
    }
}

impl Default for DeviceProps {
    fn default() -> Self {
        Self::hip_like()
    }
}
