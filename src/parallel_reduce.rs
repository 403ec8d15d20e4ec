//! Two-level parallel reduction over a work domain
//!
//! Planning happens on the host before any device work: the value's word
//! layout, the block width, the grid and the block scratch size. Execution
//! allocates the partials array and the completion counter, launches one
//! kernel, and for host destinations copies the staged result back.
//!
//! # Example
//!
//! ```rust
//! use mdreduce::{parallel_reduce, Sum, WorkDomain};
//! use mdreduce_device::SimDevice;
//!
//! let device = SimDevice::default();
//! let domain = WorkDomain::from_extents(&[100, 100]).unwrap();
//! let ones = |_: &[i64], acc: &mut u64| *acc += 1;
//! let total = parallel_reduce(&device, &domain, ones, Sum::<u64>::new()).unwrap();
//! assert_eq!(total, 10_000);
//! ```

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use mdreduce_device::{Device, DeviceBuffer, Word};
use tracing::{debug, instrument};

use crate::block_size::{deduce_block_width, max_tile_size_product, scratch_bytes};
use crate::config::ReduceConfig;
use crate::domain::WorkDomain;
use crate::error::{ReduceError, Result};
use crate::finalize::{CompletionCounter, FinalizeTargets};
use crate::iterate::Functor;
use crate::kernel::ReduceKernel;
use crate::layout::{WordLayout, WordSize};
use crate::partition::GridShape;
use crate::reducer::Reducer;
use crate::scratch::WordBuffer;

/// Launch geometry decided before any device work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducePlan {
    /// Word layout of the reduction value
    pub layout: WordLayout,
    /// Lanes per block
    pub block_width: u32,
    /// Blocks in the grid (0 for an empty domain)
    pub grid: u32,
    /// Block scratch bytes
    pub shared_bytes: usize,
}

impl ReducePlan {
    /// Plan a reduction of `domain` with `reducer` on `device`
    ///
    /// # Errors
    ///
    /// Configuration errors only: `ValueSizeMismatch`, `NoValidTileSize`,
    /// `TileTooLarge` or `BlockWidthBelowTile`.
    #[instrument(level = "debug", skip_all, fields(device = device.name(), tiles = domain.num_tiles()))]
    pub fn prepare<D: Device, R: Reducer>(
        device: &D,
        domain: &WorkDomain,
        reducer: &R,
        config: &ReduceConfig,
    ) -> Result<Self> {
        let layout = WordLayout::of::<R::Value>();
        if reducer.value_size() != layout.value_bytes() {
            return Err(ReduceError::ValueSizeMismatch {
                declared: reducer.value_size(),
                actual: layout.value_bytes(),
            });
        }

        let max_tile = max_tile_size_product(device, &layout)?;
        if domain.tile_elements() > max_tile {
            return Err(ReduceError::TileTooLarge {
                elements: domain.tile_elements(),
                max: max_tile,
            });
        }

        let block_width = deduce_block_width(device, &layout, domain.tile_elements(), config)?;
        let shape = GridShape::new(domain.num_tiles(), block_width);
        let plan = Self {
            layout,
            block_width,
            grid: shape.grid,
            shared_bytes: scratch_bytes(&layout, block_width),
        };
        debug!(
            block_width,
            grid = plan.grid,
            tiles_per_block = shape.tiles_for_block(0, domain.num_tiles()),
            word = ?layout.word(),
            word_count = layout.word_count(),
            shared_bytes = plan.shared_bytes,
            "planned reduction"
        );
        Ok(plan)
    }

    /// Grid shape of the plan
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        GridShape {
            grid: self.grid,
            block: self.block_width,
        }
    }
}

/// Device-resident reduction result
///
/// Owns one value slot of device memory in the layout of `V`.
#[derive(Debug)]
pub struct DeviceResult<V> {
    buffer: WordBuffer,
    layout: WordLayout,
    _value: PhantomData<fn() -> V>,
}

impl<V: Pod> DeviceResult<V> {
    /// Allocate a zeroed result slot on `device`
    ///
    /// # Errors
    ///
    /// Propagates device allocation failures.
    pub fn new<D: Device>(device: &D) -> Result<Self> {
        let layout = WordLayout::of::<V>();
        Ok(Self {
            buffer: WordBuffer::allocate(device, &layout, 1)?,
            layout,
            _value: PhantomData,
        })
    }

    /// Fetch the value to the host
    ///
    /// # Errors
    ///
    /// Propagates device transfer failures.
    pub fn read<D: Device>(&self, device: &D) -> Result<V> {
        let mut value = V::zeroed();
        self.buffer
            .copy_first_to_host(device, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    pub(crate) const fn buffer(&self) -> &WordBuffer {
        &self.buffer
    }

    pub(crate) const fn layout(&self) -> &WordLayout {
        &self.layout
    }
}

/// Where the final value goes
#[derive(Debug)]
pub enum Destination<'a, V> {
    /// Host memory; filled by a device-to-host copy after the launch
    Host(&'a mut V),
    /// Device memory; written in place by the finalizer block
    Device(&'a DeviceResult<V>),
}

/// What a reduction did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceReport {
    /// Whether a kernel was launched (false for empty domains)
    pub launched: bool,
    /// Lanes per block
    pub block_width: u32,
    /// Blocks in the grid
    pub grid: u32,
    /// Word size of the value layout
    pub word: WordSize,
    /// Words per value
    pub word_count: usize,
    /// Block scratch bytes
    pub shared_bytes: usize,
    /// Blocks that took the finalization path
    pub finalizations: u32,
    /// Ordinal of the finalizing block
    pub finalizer_block: Option<u32>,
}

impl ReduceReport {
    fn empty(layout: &WordLayout) -> Self {
        Self {
            launched: false,
            block_width: 0,
            grid: 0,
            word: layout.word(),
            word_count: layout.word_count(),
            shared_bytes: 0,
            finalizations: 0,
            finalizer_block: None,
        }
    }
}

/// Destination with the result buffer already typed by word
enum Delivery<'a, V, W: Word> {
    /// Staged in partials slot 0, then copied to the host
    Host(&'a mut V),
    /// Written in place by the finalizer
    InPlace(&'a DeviceBuffer<W>),
}

/// A reduction of one functor over one domain
pub struct ParallelReduce<'a, D, R, F> {
    device: &'a D,
    domain: &'a WorkDomain,
    functor: F,
    reducer: R,
    config: ReduceConfig,
}

impl<'a, D, R, F> ParallelReduce<'a, D, R, F>
where
    D: Device,
    R: Reducer,
    F: Functor<R::Value>,
{
    /// Reduce `functor` over `domain` with `reducer` on `device`
    pub fn new(device: &'a D, domain: &'a WorkDomain, functor: F, reducer: R) -> Self {
        Self {
            device,
            domain,
            functor,
            reducer,
            config: ReduceConfig::default(),
        }
    }

    /// Use `config` instead of the default configuration
    #[must_use]
    pub fn with_config(mut self, config: ReduceConfig) -> Self {
        self.config = config;
        self
    }

    /// Plan without executing
    ///
    /// # Errors
    ///
    /// See [`ReducePlan::prepare`].
    pub fn plan(&self) -> Result<ReducePlan> {
        ReducePlan::prepare(self.device, self.domain, &self.reducer, &self.config)
    }

    /// Run the reduction and deliver the result to `dest`
    ///
    /// An empty domain writes the reducer's identity and launches nothing.
    /// For a host destination the value is only written by the final
    /// device-to-host copy.
    ///
    /// # Errors
    ///
    /// Configuration errors before any device work, device errors
    /// (allocation, launch, execution fault, transfer) afterwards. Nothing
    /// is retried.
    #[instrument(level = "debug", skip_all, fields(device = self.device.name(), elements = self.domain.num_elements()))]
    pub fn execute(&self, dest: Destination<'_, R::Value>) -> Result<ReduceReport> {
        let layout = WordLayout::of::<R::Value>();

        if self.domain.num_tiles() == 0 {
            debug!("empty domain, writing identity");
            let identity = self.reducer.init();
            match dest {
                Destination::Host(value) => *value = identity,
                Destination::Device(result) => result.buffer().store_first(result.layout(), &identity),
            }
            return Ok(ReduceReport::empty(&layout));
        }

        let plan = self.plan()?;
        // DeviceResult<V> and the plan both take their layout from V
        match dest {
            Destination::Host(value) => match plan.layout.word() {
                WordSize::Quarter => self.launch::<u8>(&plan, Delivery::Host(value)),
                WordSize::Half => self.launch::<u16>(&plan, Delivery::Host(value)),
                WordSize::Full => self.launch::<u32>(&plan, Delivery::Host(value)),
            },
            Destination::Device(result) => match result.buffer() {
                WordBuffer::Quarter(words) => self.launch(&plan, Delivery::InPlace(words)),
                WordBuffer::Half(words) => self.launch(&plan, Delivery::InPlace(words)),
                WordBuffer::Full(words) => self.launch(&plan, Delivery::InPlace(words)),
            },
        }
    }

    fn launch<W: Word>(
        &self,
        plan: &ReducePlan,
        delivery: Delivery<'_, R::Value, W>,
    ) -> Result<ReduceReport> {
        let layout = plan.layout;
        let partials = self
            .device
            .allocate_scratch::<W>(layout.words_for(plan.block_width as usize))?;
        let counter_word = self.device.allocate_scratch::<u32>(1)?;
        let counter = CompletionCounter::new(&counter_word);
        counter.reset();

        let (host, result) = match delivery {
            Delivery::Host(value) => (Some(value), &partials),
            Delivery::InPlace(words) => (None, words),
        };

        let kernel = ReduceKernel::new(
            self.domain,
            &self.functor,
            &self.reducer,
            layout,
            FinalizeTargets {
                partials: &partials,
                counter,
                result,
            },
        );
        self.device
            .launch(&kernel, &plan.shape().launch_config(plan.shared_bytes))?;
        // every block arrived, so the counter has wrapped back to zero
        debug!(
            finalizer = ?kernel.finalizer(),
            counter = counter.count(),
            "launch complete"
        );

        if let Some(value) = host {
            self.device
                .device_to_host_copy(bytemuck::bytes_of_mut(value), &partials)?;
        }

        Ok(ReduceReport {
            launched: true,
            block_width: plan.block_width,
            grid: plan.grid,
            word: layout.word(),
            word_count: layout.word_count(),
            shared_bytes: plan.shared_bytes,
            finalizations: kernel.finalizations(),
            finalizer_block: kernel.finalizer(),
        })
    }
}

/// Reduce `functor` over `domain` and return the value on the host
///
/// # Errors
///
/// See [`ParallelReduce::execute`].
pub fn parallel_reduce<D, R, F>(device: &D, domain: &WorkDomain, functor: F, reducer: R) -> Result<R::Value>
where
    D: Device,
    R: Reducer,
    F: Functor<R::Value>,
{
    let mut value = reducer.init();
    ParallelReduce::new(device, domain, functor, reducer).execute(Destination::Host(&mut value))?;
    Ok(value)
}
