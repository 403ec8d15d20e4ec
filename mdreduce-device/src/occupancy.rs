//! Occupancy Advisory
//!
//! Suggests block widths from a block-scratch cost function. Only
//! power-of-two widths between the warp size and the device maximum are
//! considered.

use crate::driver::DeviceProps;

/// Power-of-two candidate widths, smallest first
fn candidate_widths(props: &DeviceProps) -> impl Iterator<Item = u32> + '_ {
    let first = props.warp_size.max(1).next_power_of_two();
    std::iter::successors(Some(first), |w| w.checked_mul(2))
        .take_while(move |&w| w <= props.max_block_width)
}

/// Resident lanes per compute unit for one block width, 0 if none fit
fn resident_lanes(props: &DeviceProps, width: u32, shared_bytes: usize) -> u32 {
    if shared_bytes > props.shared_mem_per_block {
        return 0;
    }
    let by_threads = props.max_threads_per_cu / width;
    let by_shared = if shared_bytes == 0 {
        u32::MAX
    } else {
        u32::try_from(props.shared_mem_per_cu / shared_bytes).unwrap_or(u32::MAX)
    };
    by_threads.min(by_shared).min(props.max_blocks_per_cu) * width
}

/// Block width with the highest occupancy, or 0 if no width fits
///
/// Ties favour the wider block.
#[must_use]
pub fn suggest_block_size(props: &DeviceProps, shared_cost: &dyn Fn(u32) -> usize) -> u32 {
    let mut best = 0;
    let mut best_lanes = 0;
    for width in candidate_widths(props) {
        let lanes = resident_lanes(props, width, shared_cost(width));
        if lanes > 0 && lanes >= best_lanes {
            best = width;
            best_lanes = lanes;
        }
    }
    best
}

/// Widest block that can be resident at all, or 0 if no width fits
#[must_use]
pub fn max_block_size(props: &DeviceProps, shared_cost: &dyn Fn(u32) -> usize) -> u32 {
    candidate_widths(props)
        .filter(|&w| resident_lanes(props, w, shared_cost(w)) > 0)
        .last()
        .unwrap_or(0)
}
