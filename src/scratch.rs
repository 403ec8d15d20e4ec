//! Word-typed device buffers
//!
//! The word type is picked at run time from the value layout, while kernels
//! are generic over it. [`WordBuffer`] holds a buffer of whichever word was
//! picked; matching on it yields the typed buffer for the kernel.

use bytemuck::Pod;
use mdreduce_device::{Device, DeviceBuffer, Word};

use crate::error::Result;
use crate::layout::{store_value, WordLayout, WordSize};

/// Device buffer of quarter, half or full words
#[derive(Debug)]
pub enum WordBuffer {
    /// 1-byte words
    Quarter(DeviceBuffer<u8>),
    /// 2-byte words
    Half(DeviceBuffer<u16>),
    /// 4-byte words
    Full(DeviceBuffer<u32>),
}

impl WordBuffer {
    /// Allocate `slots` value slots laid out per `layout`
    ///
    /// # Errors
    ///
    /// Propagates device allocation failures.
    pub fn allocate<D: Device>(device: &D, layout: &WordLayout, slots: usize) -> Result<Self> {
        let words = layout.words_for(slots);
        Ok(match layout.word() {
            WordSize::Quarter => Self::Quarter(device.allocate_scratch(words)?),
            WordSize::Half => Self::Half(device.allocate_scratch(words)?),
            WordSize::Full => Self::Full(device.allocate_scratch(words)?),
        })
    }

    /// Write `value` into slot 0 from the host side
    pub fn store_first<V: Pod>(&self, layout: &WordLayout, value: &V) {
        fn put<V: Pod, W: Word>(buffer: &DeviceBuffer<W>, layout: &WordLayout, value: &V) {
            let mut words = vec![W::default(); layout.word_count()];
            store_value(&mut words, value);
            buffer.write_words(0, &words);
        }
        match self {
            Self::Quarter(b) => put(b, layout, value),
            Self::Half(b) => put(b, layout, value),
            Self::Full(b) => put(b, layout, value),
        }
    }

    /// Copy slot 0 to the host through `device`
    ///
    /// # Errors
    ///
    /// Propagates device transfer failures.
    pub fn copy_first_to_host<D: Device>(&self, device: &D, dst: &mut [u8]) -> Result<()> {
        match self {
            Self::Quarter(b) => device.device_to_host_copy(dst, b)?,
            Self::Half(b) => device.device_to_host_copy(dst, b)?,
            Self::Full(b) => device.device_to_host_copy(dst, b)?,
        }
        Ok(())
    }
}
