//! Word layout of reduction values
//!
//! A reduction value is moved between block scratch, device-global scratch
//! and the result location as a run of whole words. The word is the widest
//! of the full (4 byte), half or quarter machine word that divides the value
//! size and does not exceed its alignment, so no copy is ever fractional.
//! The choice is made once per launch; scratch indexing then strides by
//! `word_count` words per value slot.

use std::ops::Range;

use bytemuck::Pod;
use mdreduce_device::Word;

/// Access granularity for a reduction value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WordSize {
    /// 1-byte words
    Quarter,
    /// 2-byte words
    Half,
    /// 4-byte words
    Full,
}

impl WordSize {
    /// Word size in bytes
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Quarter => 1,
            Self::Half => 2,
            Self::Full => 4,
        }
    }

    /// Widest word dividing `value_bytes` that respects `align`
    #[must_use]
    pub const fn for_value(value_bytes: usize, align: usize) -> Self {
        if value_bytes % 4 == 0 && align >= 4 {
            Self::Full
        } else if value_bytes % 2 == 0 && align >= 2 {
            Self::Half
        } else {
            Self::Quarter
        }
    }
}

/// Word layout of one reduction value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordLayout {
    value_bytes: usize,
    word: WordSize,
}

impl WordLayout {
    /// Layout for a value of `value_bytes` bytes aligned to `align`
    #[must_use]
    pub const fn new(value_bytes: usize, align: usize) -> Self {
        Self {
            value_bytes,
            word: WordSize::for_value(value_bytes, align),
        }
    }

    /// Layout for values of type `V`
    #[must_use]
    pub const fn of<V: Pod>() -> Self {
        Self::new(std::mem::size_of::<V>(), std::mem::align_of::<V>())
    }

    /// Chosen word size
    #[must_use]
    pub const fn word(&self) -> WordSize {
        self.word
    }

    /// Bytes per word
    #[must_use]
    pub const fn word_bytes(&self) -> usize {
        self.word.bytes()
    }

    /// Words per value
    #[must_use]
    pub const fn word_count(&self) -> usize {
        self.value_bytes / self.word.bytes()
    }

    /// Bytes per value
    #[must_use]
    pub const fn value_bytes(&self) -> usize {
        self.value_bytes
    }

    /// Words needed for `slots` values
    #[must_use]
    pub const fn words_for(&self, slots: usize) -> usize {
        slots * self.word_count()
    }

    /// Word range of value slot `slot`
    #[must_use]
    pub const fn slot(&self, slot: usize) -> Range<usize> {
        let start = slot * self.word_count();
        start..start + self.word_count()
    }
}

/// Write `value` into `words` (exactly one value slot)
///
/// # Panics
///
/// Panics if `words` does not span exactly `size_of::<V>()` bytes.
#[inline]
pub fn store_value<V: Pod, W: Word>(words: &mut [W], value: &V) {
    bytemuck::cast_slice_mut::<W, u8>(words).copy_from_slice(bytemuck::bytes_of(value));
}

/// Read a value back from `words` (exactly one value slot)
///
/// # Panics
///
/// Panics if `words` does not span exactly `size_of::<V>()` bytes.
#[inline]
#[must_use]
pub fn load_value<V: Pod, W: Word>(words: &[W]) -> V {
    bytemuck::pod_read_unaligned(bytemuck::cast_slice::<W, u8>(words))
}
