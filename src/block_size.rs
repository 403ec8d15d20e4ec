//! Block width deduction
//!
//! Every lane of a block owns one reduction value slot in block scratch, so
//! the scratch cost of a width is `width * value_bytes`. The width is the
//! larger of the tile's power-of-two cover and the occupancy suggestion,
//! clamped to the widest legal power of two and to any launch bound.

use mdreduce_device::Device;
use tracing::{debug, warn};

use crate::config::ReduceConfig;
use crate::error::{ReduceError, Result};
use crate::layout::WordLayout;

/// Block scratch bytes needed by `lanes` lanes
#[inline]
#[must_use]
pub fn scratch_bytes(layout: &WordLayout, lanes: u32) -> usize {
    layout.value_bytes() * lanes as usize
}

/// Largest power of two not above `x` (0 for 0)
#[inline]
#[must_use]
pub const fn prev_power_of_two(x: u32) -> u32 {
    if x == 0 {
        0
    } else {
        1 << (31 - x.leading_zeros())
    }
}

/// Largest tile element count a block can host for this value layout
///
/// # Errors
///
/// Returns `Err(ReduceError::NoValidTileSize)` if no block width fits the
/// value in block scratch.
pub fn max_tile_size_product<D: Device>(device: &D, layout: &WordLayout) -> Result<usize> {
    let cost = |lanes: u32| scratch_bytes(layout, lanes);
    match device.max_block_size(&cost) {
        0 => Err(no_valid_tile_size(device, layout)),
        width => Ok(width as usize),
    }
}

/// Pick the block width for tiles of `tile_elements` elements
///
/// The result is a power of two, at least `tile_elements`, no wider than the
/// device allows and within the block scratch budget.
///
/// # Errors
///
/// - `NoValidTileSize` if the occupancy query finds no width, or the width
///   the tile forces does not fit block scratch
/// - `TileTooLarge` if the tile needs more lanes than the device has
/// - `BlockWidthBelowTile` if `config.max_block_width` is below the tile
pub fn deduce_block_width<D: Device>(
    device: &D,
    layout: &WordLayout,
    tile_elements: usize,
    config: &ReduceConfig,
) -> Result<u32> {
    let props = device.props();
    let cost = |lanes: u32| scratch_bytes(layout, lanes);

    let suggested = device.suggest_block_size(&cost);
    if suggested == 0 {
        return Err(no_valid_tile_size(device, layout));
    }

    let max_legal = prev_power_of_two(props.max_block_width);
    let tile_width = u32::try_from(tile_elements.max(1).next_power_of_two())
        .ok()
        .filter(|&w| w <= max_legal)
        .ok_or(ReduceError::TileTooLarge {
            elements: tile_elements,
            max: max_legal as usize,
        })?;

    let mut width = tile_width.max(suggested).min(max_legal);

    if let Some(limit) = config.max_block_width {
        let cap = prev_power_of_two(limit);
        if cap < width {
            warn!(width, limit, cap, "launch bound clamps block width");
            width = cap;
        }
        if (width as usize) < tile_elements {
            return Err(ReduceError::BlockWidthBelowTile {
                limit,
                elements: tile_elements,
            });
        }
    }

    let needed = scratch_bytes(layout, width);
    if needed > props.shared_mem_per_block {
        return Err(ReduceError::NoValidTileSize(format!(
            "{width} lanes need {needed} bytes of block scratch, {} has {}",
            props.name, props.shared_mem_per_block
        )));
    }

    debug!(tile_elements, tile_width, suggested, width, "deduced block width");
    Ok(width)
}

fn no_valid_tile_size<D: Device>(device: &D, layout: &WordLayout) -> ReduceError {
    ReduceError::NoValidTileSize(format!(
        "{}-byte values do not fit {} bytes of block scratch on {} at any width",
        layout.value_bytes(),
        device.props().shared_mem_per_block,
        device.name()
    ))
}
