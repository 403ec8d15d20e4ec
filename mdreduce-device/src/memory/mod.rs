//! Device Memory
//!
//! Device-global buffers are arrays of atomic words so that concurrently
//! running blocks can write disjoint slots without `unsafe`. Individual word
//! accesses are `Relaxed`; cross-block visibility is established by the
//! caller's fences and acquire/release operations, exactly as on hardware.

use std::fmt;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use bytemuck::Pod;

use crate::error::{DeviceError, Result};

/// A unit of device memory access.
///
/// Implemented for the quarter, half and full machine word (`u8`, `u16`,
/// `u32`). Every copy between scratch spaces moves whole words.
pub trait Word: Pod + Default + Eq + fmt::Debug + Send + Sync + 'static {
    /// Atomic cell holding one word in device-global memory
    type Cell: Send + Sync;

    /// Size of the word in bytes
    const BYTES: usize;

    /// Create a cell holding `value`
    fn cell(value: Self) -> Self::Cell;

    /// Relaxed load
    fn load(cell: &Self::Cell) -> Self;

    /// Relaxed store
    fn store(cell: &Self::Cell, value: Self);
}

macro_rules! impl_word {
    ($word:ty, $atomic:ty) => {
        impl Word for $word {
            type Cell = $atomic;
            const BYTES: usize = std::mem::size_of::<$word>();

            #[inline]
            fn cell(value: Self) -> Self::Cell {
                <$atomic>::new(value)
            }

            #[inline]
            fn load(cell: &Self::Cell) -> Self {
                cell.load(Ordering::Relaxed)
            }

            #[inline]
            fn store(cell: &Self::Cell, value: Self) {
                cell.store(value, Ordering::Relaxed);
            }
        }
    };
}

impl_word!(u8, AtomicU8);
impl_word!(u16, AtomicU16);
impl_word!(u32, AtomicU32);

/// Device-global memory buffer
///
/// Shared by reference across every block of a launch.
pub struct DeviceBuffer<W: Word> {
    cells: Box<[W::Cell]>,
}

impl<W: Word> DeviceBuffer<W> {
    /// Allocate a zero-filled buffer of `len` words
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        let cells = (0..len).map(|_| W::cell(W::default())).collect();
        Self { cells }
    }

    /// Get number of words
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.cells.len() * W::BYTES
    }

    /// Load one word
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds (a device memory fault).
    #[inline]
    #[must_use]
    pub fn load(&self, index: usize) -> W {
        W::load(&self.cells[index])
    }

    /// Store one word
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds (a device memory fault).
    #[inline]
    pub fn store(&self, index: usize, value: W) {
        W::store(&self.cells[index], value);
    }

    /// Copy `dst.len()` words starting at `offset` out of the buffer
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds (a device memory fault).
    pub fn read_words(&self, offset: usize, dst: &mut [W]) {
        for (cell, word) in self.cells[offset..offset + dst.len()].iter().zip(dst) {
            *word = W::load(cell);
        }
    }

    /// Copy `src` into the buffer starting at `offset`
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds (a device memory fault).
    pub fn write_words(&self, offset: usize, src: &[W]) {
        for (cell, &word) in self.cells[offset..offset + src.len()].iter().zip(src) {
            W::store(cell, word);
        }
    }

    /// Reset every word to zero
    pub fn fill_zero(&self) {
        for cell in self.cells.iter() {
            W::store(cell, W::default());
        }
    }

    /// Snapshot the whole buffer as words
    #[must_use]
    pub fn to_words(&self) -> Vec<W> {
        self.cells.iter().map(W::load).collect()
    }

    /// Copy the first `dst.len()` bytes of the buffer into `dst`
    ///
    /// # Errors
    ///
    /// Returns `Err(DeviceError::Transfer)` if `dst` is longer than the
    /// buffer or is not a whole number of words.
    pub fn copy_to_bytes(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.size_bytes() {
            return Err(DeviceError::Transfer(format!(
                "Length mismatch: host {} bytes vs device {} bytes",
                dst.len(),
                self.size_bytes()
            )));
        }
        if dst.len() % W::BYTES != 0 {
            return Err(DeviceError::Transfer(format!(
                "{} bytes is not a whole number of {}-byte words",
                dst.len(),
                W::BYTES
            )));
        }
        for (cell, chunk) in self.cells.iter().zip(dst.chunks_exact_mut(W::BYTES)) {
            chunk.copy_from_slice(bytemuck::bytes_of(&W::load(cell)));
        }
        Ok(())
    }
}

impl DeviceBuffer<u32> {
    /// Wrapping atomic increment of word `index`
    ///
    /// Stores `0` when the old value is at least `limit`, otherwise
    /// `old + 1`, and returns the old value. Acquire/release ordered, so the
    /// caller that observes the final count also observes every write made
    /// before the other callers' increments.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds (a device memory fault).
    pub fn atomic_inc(&self, index: usize, limit: u32) -> u32 {
        self.cells[index]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                Some(if old >= limit { 0 } else { old + 1 })
            })
            .unwrap_or_else(|old| old)
    }
}

impl<W: Word> fmt::Debug for DeviceBuffer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("word_bytes", &W::BYTES)
            .field("len", &self.len())
            .finish()
    }
}
