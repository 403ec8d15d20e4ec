//! mdreduce: Two-Level Block Reduction over N-D Domains
//!
//! **mdreduce** reduces a per-element operator over a tiled N-dimensional
//! index range on a many-block accelerator, in two passes:
//!
//! 1. **Intra-block** - every lane folds its indices, then the block
//!    tree-combines the lane values in block scratch
//! 2. **Inter-block** - blocks publish partials to device memory; the last
//!    block to arrive at an atomic completion counter combines them and
//!    applies the final transform
//!
//! # Design Principles
//!
//! - **Whole-word copies**: values of any size move through scratch as
//!   quarter, half or full words chosen from their size and alignment
//! - **Exactly one finalizer**: no block ever waits on another
//! - **Fail fast**: configuration errors before launch, device faults
//!   reported once, nothing retried
//!
//! # Quick Start
//!
//! ```rust
//! use mdreduce::{parallel_reduce, MinMax, WorkDomain};
//! use mdreduce_device::{DeviceProps, SimDevice};
//!
//! let device = SimDevice::new(DeviceProps::cuda_like());
//! let domain = WorkDomain::new(&[0, 0], &[64, 48], &[4, 8]).unwrap();
//!
//! let span = parallel_reduce(
//!     &device,
//!     &domain,
//!     |idx: &[i64], acc: &mut [i64; 2]| {
//!         let v = idx[0] - idx[1];
//!         acc[0] = acc[0].min(v);
//!         acc[1] = acc[1].max(v);
//!     },
//!     MinMax::<i64>::new(),
//! )
//! .unwrap();
//! assert_eq!(span, [-47, 63]);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// Allow possible truncation - widths, grids and tile extents are bounded by device limits
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

pub mod block_reduce;
pub mod block_size;
pub mod config;
pub mod domain;
pub mod error;
pub mod finalize;
pub mod iterate;
pub mod layout;
pub mod parallel_reduce;
pub mod partition;
pub mod reducer;
pub mod reference;
pub mod scratch;

mod kernel;

pub use config::ReduceConfig;
pub use domain::{WorkDomain, DEFAULT_INNER_TILE, MAX_RANK};
pub use error::{ReduceError, Result};
pub use iterate::Functor;
pub use layout::{WordLayout, WordSize};
pub use parallel_reduce::{
    parallel_reduce, Destination, DeviceResult, ParallelReduce, ReducePlan, ReduceReport,
};
pub use reducer::{Max, MaxLoc, Mean, MeanAcc, Min, MinLoc, MinMax, Prod, Reducer, Sum, ValLoc};
