//! Intra-block tree reduction
//!
//! Lane partials sit in block scratch, one value slot per lane. Each step
//! doubles the stride `s` and lets every lane with `(lane + 1) % 2s == 0`
//! join its left neighbour's slot `lane - s` in front of its own, with a
//! full-block barrier after the step. After `log2(width)` steps the last
//! lane's slot holds the combined value. Operands are always joined
//! left-before-right, so lane order is preserved.

use mdreduce_device::{BlockContext, Word};

use crate::layout::{load_value, store_value, WordLayout};
use crate::reducer::Reducer;

/// Slot that ends up holding the block's combined value
#[inline]
#[must_use]
pub const fn result_slot(block_dim: u32) -> usize {
    block_dim.saturating_sub(1) as usize
}

/// Tree-combine the lane slots in block scratch
///
/// Block width must be a power of two.
pub fn reduce_block<R: Reducer, W: Word>(reducer: &R, layout: &WordLayout, block: &mut BlockContext) {
    let lanes = block.block_dim() as usize;
    debug_assert!(lanes.is_power_of_two(), "block width {lanes} is not a power of two");

    let mut stride = 1;
    while stride < lanes {
        let shared = block.shared::<W>();
        for lane in (2 * stride - 1..lanes).step_by(2 * stride) {
            let mut acc: R::Value = load_value(&shared[layout.slot(lane - stride)]);
            let right: R::Value = load_value(&shared[layout.slot(lane)]);
            reducer.join(&mut acc, &right);
            store_value(&mut shared[layout.slot(lane)], &acc);
        }
        block.sync_threads();
        stride *= 2;
    }
}

/// Read the combined value after [`reduce_block`]
#[must_use]
pub fn block_result<V: bytemuck::Pod, W: Word>(layout: &WordLayout, block: &mut BlockContext) -> V {
    let slot = layout.slot(result_slot(block.block_dim()));
    load_value(&block.shared::<W>()[slot])
}
