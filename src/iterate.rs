//! Tile iteration
//!
//! Blocks walk tiles grid-stride: block `b` of a `g`-block grid takes tiles
//! `b, b + g, b + 2g, ...`. Inside each tile, lane `l` takes element `l`
//! (row-major), so a block needs at least `tile_elements` lanes and lanes
//! past that stay idle. Indices of edge tiles that fall outside the upper
//! bound are skipped.

use crate::domain::{WorkDomain, MAX_RANK};

/// Per-element operator folded into a lane accumulator
pub trait Functor<V>: Sync {
    /// Contribute element `index` to `acc`
    fn apply(&self, index: &[i64], acc: &mut V);
}

impl<V, F> Functor<V> for F
where
    F: Fn(&[i64], &mut V) + Sync,
{
    #[inline]
    fn apply(&self, index: &[i64], acc: &mut V) {
        self(index, acc);
    }
}

/// Fold every index owned by `lane` of block `block` into `acc`
pub fn for_each_lane_index<V, F: Functor<V> + ?Sized>(
    domain: &WorkDomain,
    block: u64,
    grid: u64,
    lane: usize,
    functor: &F,
    acc: &mut V,
) {
    if lane >= domain.tile_elements() || grid == 0 {
        return;
    }
    let rank = domain.rank();
    let offset = domain.tile_offset(lane);
    let mut index = [0i64; MAX_RANK];

    let mut tile = block;
    while tile < domain.num_tiles() {
        if domain.resolve(&domain.tile_start(tile), &offset, &mut index) {
            functor.apply(&index[..rank], acc);
        }
        tile += grid;
    }
}

/// Visit every in-bounds index of tile `tile` in row-major order
pub fn for_each_tile_index(domain: &WorkDomain, tile: u64, mut visit: impl FnMut(&[i64])) {
    let rank = domain.rank();
    let start = domain.tile_start(tile);
    let mut index = [0i64; MAX_RANK];
    for element in 0..domain.tile_elements() {
        if domain.resolve(&start, &domain.tile_offset(element), &mut index) {
            visit(&index[..rank]);
        }
    }
}
