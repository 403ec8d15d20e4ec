//! MD-range reduction demo
//!
//! Reduces a few functors over 2-D and 3-D domains on two simulated devices
//! and prints the launch geometry the engine picked.
//!
//! Run with: `cargo run --example mdrange_sum`

use mdreduce::reference::host_reduce;
use mdreduce::{
    Destination, DeviceResult, MaxLoc, ParallelReduce, ReduceConfig, Result, Sum, ValLoc,
    WorkDomain,
};
use mdreduce_device::{Device, DeviceProps, SimDevice};

#[allow(clippy::cast_precision_loss)]
fn main() -> Result<()> {
    for device in [
        SimDevice::new(DeviceProps::hip_like()),
        SimDevice::new(DeviceProps::cuda_like()),
    ] {
        println!("== {} ==", device.name());

        // 100x100 domain of ones
        let domain = WorkDomain::from_extents(&[100, 100])?;
        let mut count = 0u64;
        let report = ParallelReduce::new(&device, &domain, |_: &[i64], acc: &mut u64| *acc += 1, Sum::<u64>::new())
            .execute(Destination::Host(&mut count))?;
        println!(
            "count    = {count:>8}  block {:>4}  grid {:>4}  finalizer {:?}",
            report.block_width, report.grid, report.finalizer_block
        );

        // Peak of a 3-D field, kept on the device until read
        let field = WorkDomain::new(&[-8, -8, -8], &[8, 8, 8], &[2, 4, 8])?;
        let peak = |idx: &[i64], acc: &mut ValLoc| {
            let r2 = (idx[0] * idx[0] + idx[1] * idx[1] + idx[2] * idx[2]) as f64;
            let val = (-r2 / 32.0).exp();
            let loc = field.flat_index(idx);
            if acc.loc < 0 || val > acc.val {
                *acc = ValLoc::new(val, loc);
            }
        };
        let result = DeviceResult::<ValLoc>::new(&device)?;
        let report = ParallelReduce::new(&device, &field, peak, MaxLoc)
            .with_config(ReduceConfig::new().with_max_block_width(256))
            .execute(Destination::Device(&result))?;
        let found = result.read(&device)?;
        println!(
            "peak     = {:>8.4}  at flat {}  ({:?} words x {})",
            found.val, found.loc, report.word, report.word_count
        );

        // Cross-check against the host reference
        let reference = host_reduce(&field, &peak, &MaxLoc);
        assert_eq!(found, reference);
        println!("launches = {}, copies = {}", device.launch_count(), device.copy_count());
    }
    Ok(())
}
