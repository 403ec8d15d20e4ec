//! Reduction operators
//!
//! A [`Reducer`] supplies the identity, the combine step and an optional
//! final transform for one value type. `join` must be associative and
//! commutative: lanes fold their elements in tile order, blocks combine lane
//! partials with a tree, and the finalizer combines block partials with the
//! same tree, so the grouping differs from a sequential left fold.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use num_traits::{Bounded, Num};

/// Combine operator plus identity for a reduction value
pub trait Reducer: Send + Sync {
    /// Reduction value; moved through device memory as raw words
    type Value: Pod + Send + Sync;

    /// Identity element
    fn init(&self) -> Self::Value;

    /// Fold `src` into `dst`
    fn join(&self, dst: &mut Self::Value, src: &Self::Value);

    /// Transform applied once to the fully combined value
    fn finalize(&self, _value: &mut Self::Value) {}

    /// Size of one value in bytes
    fn value_size(&self) -> usize {
        std::mem::size_of::<Self::Value>()
    }
}

/// Scalar element types accepted by the built-in reducers
pub trait Scalar: Pod + PartialOrd + Num + Bounded + Send + Sync {}

impl<T> Scalar for T where T: Pod + PartialOrd + Num + Bounded + Send + Sync {}

/// Sum reduction
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum<T>(PhantomData<T>);

impl<T> Sum<T> {
    /// Create a sum reducer
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Scalar> Reducer for Sum<T> {
    type Value = T;

    #[inline]
    fn init(&self) -> T {
        T::zero()
    }

    #[inline]
    fn join(&self, dst: &mut T, src: &T) {
        *dst = *dst + *src;
    }
}

/// Product reduction
#[derive(Debug, Clone, Copy, Default)]
pub struct Prod<T>(PhantomData<T>);

impl<T> Prod<T> {
    /// Create a product reducer
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Scalar> Reducer for Prod<T> {
    type Value = T;

    #[inline]
    fn init(&self) -> T {
        T::one()
    }

    #[inline]
    fn join(&self, dst: &mut T, src: &T) {
        *dst = *dst * *src;
    }
}

/// Minimum reduction (identity is the largest representable value)
#[derive(Debug, Clone, Copy, Default)]
pub struct Min<T>(PhantomData<T>);

impl<T> Min<T> {
    /// Create a minimum reducer
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Scalar> Reducer for Min<T> {
    type Value = T;

    #[inline]
    fn init(&self) -> T {
        T::max_value()
    }

    #[inline]
    fn join(&self, dst: &mut T, src: &T) {
        if *src < *dst {
            *dst = *src;
        }
    }
}

/// Maximum reduction (identity is the smallest representable value)
#[derive(Debug, Clone, Copy, Default)]
pub struct Max<T>(PhantomData<T>);

impl<T> Max<T> {
    /// Create a maximum reducer
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Scalar> Reducer for Max<T> {
    type Value = T;

    #[inline]
    fn init(&self) -> T {
        T::min_value()
    }

    #[inline]
    fn join(&self, dst: &mut T, src: &T) {
        if *src > *dst {
            *dst = *src;
        }
    }
}

/// Joint minimum and maximum; the value is `[min, max]`
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMax<T>(PhantomData<T>);

impl<T> MinMax<T> {
    /// Create a min/max reducer
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Scalar> Reducer for MinMax<T> {
    type Value = [T; 2];

    #[inline]
    fn init(&self) -> [T; 2] {
        [T::max_value(), T::min_value()]
    }

    #[inline]
    fn join(&self, dst: &mut [T; 2], src: &[T; 2]) {
        if src[0] < dst[0] {
            dst[0] = src[0];
        }
        if src[1] > dst[1] {
            dst[1] = src[1];
        }
    }
}

/// Value paired with the flat index where it was found
#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct ValLoc {
    /// Extremal value
    pub val: f64,
    /// Location of `val`; `-1` when nothing was seen
    pub loc: i64,
}

impl ValLoc {
    /// Pair `val` with location `loc`
    #[must_use]
    pub const fn new(val: f64, loc: i64) -> Self {
        Self { val, loc }
    }
}

/// Minimum with location; ties resolve to the smaller location
#[derive(Debug, Clone, Copy, Default)]
pub struct MinLoc;

impl Reducer for MinLoc {
    type Value = ValLoc;

    fn init(&self) -> ValLoc {
        ValLoc::new(f64::INFINITY, -1)
    }

    fn join(&self, dst: &mut ValLoc, src: &ValLoc) {
        if src.loc < 0 {
            return;
        }
        if dst.loc < 0 || src.val < dst.val || (src.val == dst.val && src.loc < dst.loc) {
            *dst = *src;
        }
    }
}

/// Maximum with location; ties resolve to the smaller location
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxLoc;

impl Reducer for MaxLoc {
    type Value = ValLoc;

    fn init(&self) -> ValLoc {
        ValLoc::new(f64::NEG_INFINITY, -1)
    }

    fn join(&self, dst: &mut ValLoc, src: &ValLoc) {
        if src.loc < 0 {
            return;
        }
        if dst.loc < 0 || src.val > dst.val || (src.val == dst.val && src.loc < dst.loc) {
            *dst = *src;
        }
    }
}

/// Running sum and count; `finalize` turns `value` into the mean
#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct MeanAcc {
    /// Sum while accumulating, mean after finalize
    pub value: f64,
    /// Number of contributions
    pub count: u64,
}

impl MeanAcc {
    /// Record one contribution
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.value += x;
        self.count += 1;
    }
}

/// Arithmetic mean
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Reducer for Mean {
    type Value = MeanAcc;

    fn init(&self) -> MeanAcc {
        MeanAcc::zeroed()
    }

    fn join(&self, dst: &mut MeanAcc, src: &MeanAcc) {
        dst.value += src.value;
        dst.count += src.count;
    }

    #[allow(clippy::cast_precision_loss)]
    fn finalize(&self, acc: &mut MeanAcc) {
        if acc.count > 0 {
            acc.value /= acc.count as f64;
        }
    }
}
