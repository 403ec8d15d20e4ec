//! Reduction kernel
//!
//! One block of the launch: every lane folds its indices into a private
//! accumulator, the block tree-combines the lane values in scratch, then
//! publishes its partial and possibly finalizes.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use mdreduce_device::{BlockContext, BlockKernel, Word};

use crate::block_reduce::reduce_block;
use crate::domain::WorkDomain;
use crate::finalize::{publish_and_finalize, FinalizeTargets};
use crate::iterate::{for_each_lane_index, Functor};
use crate::layout::{store_value, WordLayout};
use crate::reducer::Reducer;

/// No block has finalized yet
const NO_FINALIZER: u32 = u32::MAX;

pub(crate) struct ReduceKernel<'a, R: Reducer, F, W: Word> {
    domain: &'a WorkDomain,
    functor: &'a F,
    reducer: &'a R,
    layout: WordLayout,
    targets: FinalizeTargets<'a, W>,
    finalizations: AtomicU32,
    finalizer: AtomicU32,
    _value: PhantomData<fn() -> R::Value>,
}

impl<'a, R, F, W> ReduceKernel<'a, R, F, W>
where
    R: Reducer,
    F: Functor<R::Value>,
    W: Word,
{
    pub(crate) fn new(
        domain: &'a WorkDomain,
        functor: &'a F,
        reducer: &'a R,
        layout: WordLayout,
        targets: FinalizeTargets<'a, W>,
    ) -> Self {
        Self {
            domain,
            functor,
            reducer,
            layout,
            targets,
            finalizations: AtomicU32::new(0),
            finalizer: AtomicU32::new(NO_FINALIZER),
            _value: PhantomData,
        }
    }

    /// Blocks that took the finalization path
    pub(crate) fn finalizations(&self) -> u32 {
        self.finalizations.load(Ordering::Relaxed)
    }

    /// Ordinal of the finalizing block
    pub(crate) fn finalizer(&self) -> Option<u32> {
        match self.finalizer.load(Ordering::Relaxed) {
            NO_FINALIZER => None,
            block => Some(block),
        }
    }
}

impl<R, F, W> BlockKernel for ReduceKernel<'_, R, F, W>
where
    R: Reducer,
    F: Functor<R::Value>,
    W: Word,
{
    fn run_block(&self, block: &mut BlockContext) {
        let block_idx = u64::from(block.block_idx());
        let grid = u64::from(block.grid_dim());

        for lane in block.lanes() {
            let mut acc = self.reducer.init();
            for_each_lane_index(self.domain, block_idx, grid, lane as usize, self.functor, &mut acc);
            let slot = self.layout.slot(lane as usize);
            store_value(&mut block.shared::<W>()[slot], &acc);
        }
        block.sync_threads();

        reduce_block::<R, W>(self.reducer, &self.layout, block);

        if publish_and_finalize(self.reducer, &self.layout, block, &self.targets) {
            self.finalizations.fetch_add(1, Ordering::Relaxed);
            self.finalizer.store(block.block_idx(), Ordering::Relaxed);
        }
    }
}
