//! Inter-block finalization
//!
//! Each block publishes its combined value to its slot of the device-global
//! partials array, fences, and arrives at the completion counter. The block
//! whose arrival brings the count to the grid size is the only finalizer:
//! it loads one partial per lane, tree-combines them, applies
//! [`Reducer::finalize`] once and writes the result. Every other block exits
//! right after arriving; nothing ever waits on the counter.
//!
//! ```text
//! accumulating -> awaiting finalizer -> finalizing (one block) -> done
//! ```

use std::sync::atomic::{fence, Ordering};

use mdreduce_device::{BlockContext, DeviceBuffer, Word};
use tracing::trace;

use crate::block_reduce::{block_result, reduce_block, result_slot};
use crate::layout::{store_value, WordLayout};
use crate::reducer::Reducer;

/// Device-global count of blocks that have published their partial
///
/// Arrivals wrap the counter back to zero when the last block arrives, so
/// the counter is already reset for the next launch.
#[derive(Debug, Clone, Copy)]
pub struct CompletionCounter<'a> {
    word: &'a DeviceBuffer<u32>,
}

impl<'a> CompletionCounter<'a> {
    /// Counter stored in word 0 of `word`
    #[must_use]
    pub const fn new(word: &'a DeviceBuffer<u32>) -> Self {
        Self { word }
    }

    /// Zero the counter before a launch
    pub fn reset(&self) {
        self.word.fill_zero();
    }

    /// Current count
    #[must_use]
    pub fn count(&self) -> u32 {
        self.word.load(0)
    }

    /// Record one block's arrival; true for exactly one of `block_count` arrivals
    ///
    /// Acquire/release: the last arrival observes every write the other
    /// blocks made before their own arrival.
    pub fn arrive(&self, block_count: u32) -> bool {
        let limit = block_count.saturating_sub(1);
        self.word.atomic_inc(0, limit) + 1 == block_count
    }
}

/// Where a launch's blocks publish and the finalizer delivers
#[derive(Debug, Clone, Copy)]
pub struct FinalizeTargets<'a, W: Word> {
    /// One value slot per block
    pub partials: &'a DeviceBuffer<W>,
    /// Completion counter
    pub counter: CompletionCounter<'a>,
    /// Final value, written to slot 0
    pub result: &'a DeviceBuffer<W>,
}

/// Publish this block's combined value and finalize if it arrived last
///
/// Expects [`reduce_block`] to have run. Returns whether this block was the
/// finalizer.
///
/// # Panics
///
/// The finalizer panics (a device fault) if the grid is wider than the
/// block, since it folds one partial per lane.
pub fn publish_and_finalize<R: Reducer, W: Word>(
    reducer: &R,
    layout: &WordLayout,
    block: &mut BlockContext,
    targets: &FinalizeTargets<'_, W>,
) -> bool {
    let grid = block.grid_dim();
    let block_idx = block.block_idx() as usize;

    // Lane 0 publishes the block value
    let combined = layout.slot(result_slot(block.block_dim()));
    targets
        .partials
        .write_words(layout.slot(block_idx).start, &block.shared::<W>()[combined]);
    fence(Ordering::Release);

    let is_last = targets.counter.arrive(grid);
    // Broadcast the arrival result to the block
    block.sync_threads();
    if !is_last {
        return false;
    }
    fence(Ordering::Acquire);

    assert!(
        grid <= block.block_dim(),
        "grid of {grid} blocks exceeds block width {}",
        block.block_dim()
    );

    let identity = reducer.init();
    for lane in block.lanes() {
        let slot = layout.slot(lane as usize);
        let shared = block.shared::<W>();
        if lane < grid {
            targets
                .partials
                .read_words(layout.slot(lane as usize).start, &mut shared[slot]);
        } else {
            store_value(&mut shared[slot], &identity);
        }
    }
    block.sync_threads();

    reduce_block::<R, W>(reducer, layout, block);
    let mut value: R::Value = block_result::<R::Value, W>(layout, block);
    reducer.finalize(&mut value);

    let mut words = vec![W::default(); layout.word_count()];
    store_value(&mut words, &value);
    targets.result.write_words(0, &words);

    trace!(block = block_idx, grid, "block finalized reduction");
    true
}
