//! Grid partitioning
//!
//! The grid has `min(block_width, num_tiles)` blocks. Capping the grid at
//! the block width is what keeps the reduction at two passes: the finalizer
//! block gives each block partial its own lane, so it can fold them all with
//! one tree reduction. Callers may rely on `grid <= block` for every shape
//! returned here.

use mdreduce_device::LaunchConfig;

/// 1-D grid of 1-D blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// Blocks in the grid
    pub grid: u32,
    /// Lanes per block
    pub block: u32,
}

impl GridShape {
    /// Grid for `num_tiles` tiles and blocks of `block_width` lanes
    ///
    /// `grid` is 0 when there are no tiles; nothing is launched then.
    #[must_use]
    pub fn new(num_tiles: u64, block_width: u32) -> Self {
        // min() with a u32 always fits u32
        let grid = num_tiles.min(u64::from(block_width)) as u32;
        Self {
            grid,
            block: block_width,
        }
    }

    /// Tiles handled by block `block` under the grid-stride walk
    #[must_use]
    pub fn tiles_for_block(&self, block: u32, num_tiles: u64) -> u64 {
        let grid = u64::from(self.grid);
        let block = u64::from(block);
        if grid == 0 || block >= num_tiles {
            return 0;
        }
        (num_tiles - block).div_ceil(grid)
    }

    /// Launch configuration with `shared_bytes` of block scratch
    #[must_use]
    pub fn launch_config(&self, shared_bytes: usize) -> LaunchConfig {
        // scratch was checked against the per-block budget, which fits u32
        LaunchConfig::grid_1d(self.grid, self.block).with_shared_mem(shared_bytes as u32)
    }
}
