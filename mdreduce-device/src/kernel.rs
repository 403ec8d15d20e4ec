//! Block Execution Model
//!
//! A kernel is written per block. Lanes of one block execute phase by phase:
//! the kernel runs a phase for every lane in [`BlockContext::lanes`], then
//! calls [`BlockContext::sync_threads`] before the next phase reads what
//! other lanes wrote. Blocks of one launch run concurrently and never share
//! a `BlockContext`.

use std::ops::Range;

use crate::memory::Word;

/// Device code executed once per block of a launch
pub trait BlockKernel: Sync {
    /// Run this kernel for one block
    fn run_block(&self, block: &mut BlockContext);
}

/// Per-block execution state: coordinates plus block-local scratch
#[derive(Debug)]
pub struct BlockContext {
    block_idx: u32,
    grid_dim: u32,
    block_dim: u32,
    shared_bytes: usize,
    /// Backing store for block scratch; `u32` keeps every word type aligned
    shared: Vec<u32>,
    barriers: u32,
}

impl BlockContext {
    /// Create the context for block `block_idx` of a `grid_dim`-block launch
    #[must_use]
    pub fn new(block_idx: u32, grid_dim: u32, block_dim: u32, shared_bytes: usize) -> Self {
        Self {
            block_idx,
            grid_dim,
            block_dim,
            shared_bytes,
            shared: vec![0; shared_bytes.div_ceil(4)],
            barriers: 0,
        }
    }

    /// Ordinal of this block in the grid
    #[must_use]
    pub const fn block_idx(&self) -> u32 {
        self.block_idx
    }

    /// Number of blocks in the grid
    #[must_use]
    pub const fn grid_dim(&self) -> u32 {
        self.grid_dim
    }

    /// Number of lanes in this block
    #[must_use]
    pub const fn block_dim(&self) -> u32 {
        self.block_dim
    }

    /// Lane ordinals of this block
    #[must_use]
    pub const fn lanes(&self) -> Range<u32> {
        0..self.block_dim
    }

    /// Requested block scratch size in bytes
    #[must_use]
    pub const fn shared_bytes(&self) -> usize {
        self.shared_bytes
    }

    /// Block-local scratch viewed as words of type `W`
    pub fn shared<W: Word>(&mut self) -> &mut [W] {
        let words = self.shared_bytes / W::BYTES;
        &mut bytemuck::cast_slice_mut::<u32, W>(&mut self.shared)[..words]
    }

    /// Full-block barrier
    ///
    /// Every lane has finished the previous phase when this returns, so its
    /// scratch writes are visible to all lanes of the block.
    pub fn sync_threads(&mut self) {
        self.barriers += 1;
    }

    /// Number of barriers this block has passed
    #[must_use]
    pub const fn barrier_count(&self) -> u32 {
        self.barriers
    }
}
