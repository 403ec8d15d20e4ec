//! # mdreduce-device: Simulated Accelerator for Block Reductions
//!
//! Host-side model of a many-block, many-lane accelerator: launch
//! configuration, device properties, device-global word buffers, block
//! scratch, barriers and occupancy advice.
//!
//! ## Quick Start
//!
//! ```rust
//! use mdreduce_device::{Device, DeviceProps, SimDevice};
//!
//! let device = SimDevice::new(DeviceProps::cuda_like());
//! let width = device.suggest_block_size(&|lanes| lanes as usize * 8);
//! assert!(width.is_power_of_two());
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Launch configuration and device properties
//! - [`memory`] - Device-global word buffers
//! - [`kernel`] - Block execution model
//! - [`occupancy`] - Block width advice
//! - [`backend`] - `Device` trait and the simulated device

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// Allow possible truncation - widths and grids are bounded by device limits
#![allow(clippy::cast_possible_truncation)]
// Allow missing panics doc - device memory faults panic by design
#![allow(clippy::missing_panics_doc)]

pub mod backend;
pub mod driver;
pub mod kernel;
pub mod memory;
pub mod occupancy;

/// Error types for device operations
pub mod error;

pub use backend::{Device, SimDevice};
pub use driver::{DeviceProps, LaunchConfig};
pub use error::{DeviceError, Result};
pub use kernel::{BlockContext, BlockKernel};
pub use memory::{DeviceBuffer, Word};
