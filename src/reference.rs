//! Host reference reductions
//!
//! CPU counterparts of the device reduction. They are useful for:
//! - validating device results
//! - running without a device
//!
//! [`host_reduce`] folds tiles in parallel with rayon and combines the tile
//! values in whatever order rayon splits them. [`sequential_reduce`] is a
//! strict row-major left fold.

use rayon::prelude::*;

use crate::domain::WorkDomain;
use crate::iterate::{for_each_tile_index, Functor};
use crate::reducer::Reducer;

/// Parallel host reduction over all tiles of `domain`
pub fn host_reduce<R, F>(domain: &WorkDomain, functor: &F, reducer: &R) -> R::Value
where
    R: Reducer,
    F: Functor<R::Value> + ?Sized,
{
    let mut value = (0..domain.num_tiles())
        .into_par_iter()
        .fold(
            || reducer.init(),
            |mut acc, tile| {
                for_each_tile_index(domain, tile, |index| functor.apply(index, &mut acc));
                acc
            },
        )
        .reduce(
            || reducer.init(),
            |mut left, right| {
                reducer.join(&mut left, &right);
                left
            },
        );
    if domain.num_tiles() > 0 {
        reducer.finalize(&mut value);
    }
    value
}

/// Sequential row-major host reduction
pub fn sequential_reduce<R, F>(domain: &WorkDomain, functor: &F, reducer: &R) -> R::Value
where
    R: Reducer,
    F: Functor<R::Value> + ?Sized,
{
    let rank = domain.rank();
    let mut value = reducer.init();
    if domain.num_elements() == 0 {
        return value;
    }

    let mut index = domain.lower().to_vec();
    'walk: loop {
        functor.apply(&index, &mut value);
        for d in (0..rank).rev() {
            index[d] += 1;
            if index[d] < domain.upper()[d] {
                continue 'walk;
            }
            index[d] = domain.lower()[d];
        }
        break;
    }
    reducer.finalize(&mut value);
    value
}
