//! Reduction Property Tests
//!
//! End-to-end checks of the two-level reduction on the simulated device.
//!
//! Section A: Degenerate domains
//! Section B: Block geometry
//! Section C: Value layouts
//! Section D: Finalization
//! Section E: Result delivery and faults

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use mdreduce::reference::{host_reduce, sequential_reduce};
use mdreduce::{
    parallel_reduce, Destination, Max, Min, ParallelReduce, ReduceConfig, ReduceError, Reducer,
    Sum, WordSize, WorkDomain,
};
use mdreduce_device::{
    BlockKernel, Device, DeviceBuffer, DeviceError, DeviceProps, LaunchConfig, SimDevice, Word,
};
use proptest::prelude::*;

const PROPTEST_CASES: u32 = 24;

fn ones(_: &[i64], acc: &mut u64) {
    *acc += 1;
}

fn devices() -> [SimDevice; 2] {
    [
        SimDevice::new(DeviceProps::hip_like()),
        SimDevice::new(DeviceProps::cuda_like()),
    ]
}

/// Device wrapper that records what host memory held when the result copy ran
struct WatchedDevice {
    inner: SimDevice,
    sentinel: u64,
    untouched_at_copy: AtomicBool,
    copies: AtomicU64,
}

impl WatchedDevice {
    fn new(sentinel: u64) -> Self {
        Self {
            inner: SimDevice::default(),
            sentinel,
            untouched_at_copy: AtomicBool::new(false),
            copies: AtomicU64::new(0),
        }
    }
}

impl Device for WatchedDevice {
    fn props(&self) -> &DeviceProps {
        self.inner.props()
    }

    fn allocate_scratch<W: Word>(&self, words: usize) -> mdreduce_device::Result<DeviceBuffer<W>> {
        self.inner.allocate_scratch(words)
    }

    fn device_to_host_copy<W: Word>(
        &self,
        dst: &mut [u8],
        src: &DeviceBuffer<W>,
    ) -> mdreduce_device::Result<()> {
        self.untouched_at_copy
            .store(dst[..] == self.sentinel.to_ne_bytes()[..], Ordering::SeqCst);
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.inner.device_to_host_copy(dst, src)
    }

    fn launch<K: BlockKernel>(&self, kernel: &K, config: &LaunchConfig) -> mdreduce_device::Result<()> {
        self.inner.launch(kernel, config)
    }
}

// =============================================================================
// SECTION A: Degenerate domains
// =============================================================================

/// A-001: any empty extent yields the identity without a launch
#[test]
fn test_a001_empty_domains_yield_identity() {
    for extents in [vec![0], vec![5, 0], vec![0, 0, 3], vec![2, 2, 2, 2, 2, 0]] {
        let device = SimDevice::default();
        let domain = WorkDomain::from_extents(&extents).unwrap();
        let min = parallel_reduce(&device, &domain, |_: &[i64], acc: &mut i32| *acc = 0, Min::<i32>::new())
            .unwrap();
        assert_eq!(min, i32::MAX, "extents {extents:?}");
        assert_eq!(device.launch_count(), 0);
    }
}

/// A-002: a single-element domain runs one block and still finalizes once
#[test]
fn test_a002_single_element() {
    let device = SimDevice::default();
    let domain = WorkDomain::new(&[7, -2], &[8, -1], &[1, 1]).unwrap();
    let mut value = 0;
    let report = ParallelReduce::new(&device, &domain, ones, Sum::<u64>::new())
        .execute(Destination::Host(&mut value))
        .unwrap();
    assert_eq!(value, 1);
    assert_eq!(report.grid, 1);
    assert_eq!(report.finalizations, 1);
    assert_eq!(report.finalizer_block, Some(0));
}

/// A-003: domains at the ends of the i64 range count only in-bounds indices
#[test]
fn test_a003_domains_at_i64_limits() {
    let cases = [
        (vec![i64::MAX - 10], vec![i64::MAX], vec![7], 10),
        (vec![i64::MIN], vec![i64::MIN + 10], vec![7], 10),
        (vec![0, i64::MAX - 5], vec![3, i64::MAX], vec![2, 4], 15),
    ];
    for (lower, upper, tile, expected) in cases {
        let domain = WorkDomain::new(&lower, &upper, &tile).unwrap();
        for device in devices() {
            let count = parallel_reduce(&device, &domain, ones, Sum::<u64>::new()).unwrap();
            assert_eq!(count, expected, "lower {lower:?} on {}", device.name());
        }
        assert_eq!(host_reduce(&domain, &ones, &Sum::<u64>::new()), expected);
        assert_eq!(sequential_reduce(&domain, &ones, &Sum::<u64>::new()), expected);

        let innermost = |idx: &[i64], acc: &mut i64| *acc = (*acc).min(idx[idx.len() - 1]);
        let lowest =
            parallel_reduce(&SimDevice::default(), &domain, innermost, Min::<i64>::new()).unwrap();
        assert_eq!(lowest, lower[lower.len() - 1]);
    }
}

// =============================================================================
// SECTION B: Block geometry
// =============================================================================

/// B-001: 10,000 ones sum to 10,000 for every block width from 1 to 1024
#[test]
fn test_b001_ten_thousand_ones_any_width() {
    let domain = WorkDomain::new(&[0], &[10_000], &[1]).unwrap();
    for log2 in 0..=10 {
        let width = 1u32 << log2;
        for device in devices() {
            let mut value = 0;
            let report = ParallelReduce::new(&device, &domain, ones, Sum::<u64>::new())
                .with_config(ReduceConfig::new().with_max_block_width(width))
                .execute(Destination::Host(&mut value))
                .unwrap();
            assert_eq!(value, 10_000, "width {width} on {}", device.name());
            assert_eq!(report.block_width, width);
            assert_eq!(report.grid, width);
        }
    }
}

/// B-002: 100x100 domain of ones is 10,000 whatever the tile and width
#[test]
fn test_b002_two_dimensional_round_trip() {
    let tiles: [[i64; 2]; 5] = [[1, 1], [1, 32], [4, 4], [16, 16], [3, 7]];
    for tile in tiles {
        let domain = WorkDomain::new(&[0, 0], &[100, 100], &tile).unwrap();
        for cap in [None, Some(256), Some(1024)] {
            let device = SimDevice::default();
            let config = cap.map_or_else(ReduceConfig::new, |w| ReduceConfig::new().with_max_block_width(w));
            let mut value = 0u32;
            ParallelReduce::new(&device, &domain, |_: &[i64], acc: &mut u32| *acc += 1, Sum::<u32>::new())
                .with_config(config)
                .execute(Destination::Host(&mut value))
                .unwrap();
            assert_eq!(value, 10_000, "tile {tile:?} cap {cap:?}");
        }
    }
}

/// B-003: configuration errors surface before any device work
#[test]
fn test_b003_configuration_errors_before_launch() {
    let device = SimDevice::new(DeviceProps::cuda_like().with_shared_mem_per_block(256));
    let domain = WorkDomain::from_extents(&[1000]).unwrap();
    let err = parallel_reduce(&device, &domain, |_: &[i64], acc: &mut [u64; 8]| acc[0] += 1, Wide)
        .unwrap_err();
    assert!(matches!(err, ReduceError::NoValidTileSize(_)));
    assert!(err.to_string().contains("could not find a valid tile size"));
    assert_eq!(device.launch_count(), 0);

    let wide_tile = WorkDomain::new(&[0, 0], &[64, 64], &[64, 32]).unwrap();
    let err = parallel_reduce(&SimDevice::default(), &wide_tile, ones, Sum::<u64>::new()).unwrap_err();
    assert!(matches!(err, ReduceError::TileTooLarge { elements: 2048, .. }));

    let tile = WorkDomain::new(&[0], &[1000], &[100]).unwrap();
    let err = ParallelReduce::new(&SimDevice::default(), &tile, ones, Sum::<u64>::new())
        .with_config(ReduceConfig::new().with_max_block_width(32))
        .execute(Destination::Host(&mut 0))
        .unwrap_err();
    assert_eq!(
        err,
        ReduceError::BlockWidthBelowTile {
            limit: 32,
            elements: 100
        }
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    /// B-004: planned width is a legal power of two and the grid fits in it
    #[test]
    fn test_b004_plan_geometry(
        extents in prop::collection::vec(1i64..40, 1..=4),
        tile_seed in prop::collection::vec(0i64..3, 4),
        value_words in 1usize..4,
        cuda in any::<bool>(),
    ) {
        let props = if cuda { DeviceProps::cuda_like() } else { DeviceProps::hip_like() };
        let device = SimDevice::new(props.clone());
        let tile: Vec<i64> = tile_seed[..extents.len()].to_vec();
        let lower = vec![0; extents.len()];
        let domain = WorkDomain::new(&lower, &extents, &tile).unwrap();
        let plan = match value_words {
            1 => ParallelReduce::new(&device, &domain, |_: &[i64], _: &mut u32| {}, Sum::<u32>::new()).plan(),
            2 => ParallelReduce::new(&device, &domain, |_: &[i64], _: &mut u64| {}, Sum::<u64>::new()).plan(),
            _ => ParallelReduce::new(&device, &domain, |_: &[i64], _: &mut [u64; 8]| {}, Wide).plan(),
        };
        let plan = plan.unwrap();
        prop_assert!(plan.block_width.is_power_of_two());
        prop_assert!(plan.block_width <= props.max_block_width);
        prop_assert!(plan.block_width as usize >= domain.tile_elements());
        prop_assert!(plan.grid <= plan.block_width);
        prop_assert!(u64::from(plan.grid) <= domain.num_tiles());
        prop_assert!(plan.shared_bytes <= props.shared_mem_per_block);
    }

    /// B-005: device result equals the host reference for exact integer sums
    #[test]
    fn test_b005_matches_host_reference(
        lower in prop::collection::vec(-20i64..20, 3),
        extents in prop::collection::vec(0i64..25, 3),
        tile in prop::collection::vec(1i64..6, 3),
        cap_log2 in 7u32..11,
    ) {
        let upper: Vec<i64> = lower.iter().zip(&extents).map(|(l, e)| l + e).collect();
        let domain = WorkDomain::new(&lower, &upper, &tile).unwrap();
        let weight = |idx: &[i64], acc: &mut i64| *acc += idx[0] * 31 - idx[1] * 7 + idx[2];
        let device = SimDevice::default();
        let mut value = 0i64;
        ParallelReduce::new(&device, &domain, weight, Sum::<i64>::new())
            .with_config(ReduceConfig::new().with_max_block_width(1 << cap_log2))
            .execute(Destination::Host(&mut value))
            .unwrap();
        prop_assert_eq!(value, host_reduce(&domain, &weight, &Sum::<i64>::new()));
        prop_assert_eq!(value, sequential_reduce(&domain, &weight, &Sum::<i64>::new()));
    }
}

// =============================================================================
// SECTION C: Value layouts
// =============================================================================

/// 3-byte per-channel wrapping sum
struct ByteSum;

impl Reducer for ByteSum {
    type Value = [u8; 3];

    fn init(&self) -> [u8; 3] {
        [0; 3]
    }

    fn join(&self, dst: &mut [u8; 3], src: &[u8; 3]) {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = d.wrapping_add(*s);
        }
    }
}

/// 64-byte record: eight independent counters
struct Wide;

impl Reducer for Wide {
    type Value = [u64; 8];

    fn init(&self) -> [u64; 8] {
        [0; 8]
    }

    fn join(&self, dst: &mut [u64; 8], src: &[u64; 8]) {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += *s;
        }
    }
}

/// 6-byte record aligned to 2: must use half words, never truncated full words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
struct Extent16 {
    lo: i16,
    hi: i16,
    count: u16,
}

struct ExtentReducer;

impl Reducer for ExtentReducer {
    type Value = Extent16;

    fn init(&self) -> Extent16 {
        Extent16 {
            lo: i16::MAX,
            hi: i16::MIN,
            count: 0,
        }
    }

    fn join(&self, dst: &mut Extent16, src: &Extent16) {
        dst.lo = dst.lo.min(src.lo);
        dst.hi = dst.hi.max(src.hi);
        dst.count = dst.count.wrapping_add(src.count);
    }
}

/// C-001: a 3-byte value reduces through quarter words
#[test]
fn test_c001_three_byte_value() {
    let device = SimDevice::default();
    let domain = WorkDomain::from_extents(&[17, 29]).unwrap();
    let channels = |idx: &[i64], acc: &mut [u8; 3]| {
        acc[0] = acc[0].wrapping_add(1);
        acc[1] = acc[1].wrapping_add((idx[0] % 256) as u8);
        acc[2] = acc[2].wrapping_add((idx[1] % 256) as u8);
    };
    let mut value = [0u8; 3];
    let report = ParallelReduce::new(&device, &domain, channels, ByteSum)
        .execute(Destination::Host(&mut value))
        .unwrap();
    assert_eq!(report.word, WordSize::Quarter);
    assert_eq!(report.word_count, 3);
    assert_eq!(value, sequential_reduce(&domain, &channels, &ByteSum));
}

/// C-002: a 6-byte, 2-aligned record reduces through half words
#[test]
fn test_c002_six_byte_record() {
    let device = SimDevice::new(DeviceProps::cuda_like());
    let domain = WorkDomain::new(&[-300], &[500], &[8]).unwrap();
    let extent = |idx: &[i64], acc: &mut Extent16| {
        let v = idx[0] as i16;
        acc.lo = acc.lo.min(v);
        acc.hi = acc.hi.max(v);
        acc.count += 1;
    };
    let mut value = ExtentReducer.init();
    let report = ParallelReduce::new(&device, &domain, extent, ExtentReducer)
        .execute(Destination::Host(&mut value))
        .unwrap();
    assert_eq!(report.word, WordSize::Half);
    assert_eq!(report.word_count, 3);
    assert_eq!(
        value,
        Extent16 {
            lo: -300,
            hi: 499,
            count: 800
        }
    );
}

/// C-003: a 64-byte record spans sixteen full words
#[test]
fn test_c003_multi_word_record() {
    let device = SimDevice::default();
    let domain = WorkDomain::new(&[0, 0], &[40, 40], &[2, 16]).unwrap();
    let bucket = |idx: &[i64], acc: &mut [u64; 8]| acc[((idx[0] + idx[1]) % 8) as usize] += 1;
    let mut value = [0u64; 8];
    let report = ParallelReduce::new(&device, &domain, bucket, Wide)
        .execute(Destination::Host(&mut value))
        .unwrap();
    assert_eq!(report.word, WordSize::Full);
    assert_eq!(report.word_count, 16);
    assert_eq!(value.iter().sum::<u64>(), 1600);
    assert_eq!(value, host_reduce(&domain, &bucket, &Wide));
}

// =============================================================================
// SECTION D: Finalization
// =============================================================================

/// D-001: exactly one block finalizes for every grid size from 1 to 1024
#[test]
fn test_d001_single_finalizer_any_grid() {
    let device = SimDevice::default();
    for tiles in [1i64, 2, 3, 31, 64, 65, 500, 1023, 1024, 5000] {
        let domain = WorkDomain::new(&[0], &[tiles], &[1]).unwrap();
        for _ in 0..4 {
            let mut value = 0;
            let report = ParallelReduce::new(&device, &domain, ones, Sum::<u64>::new())
                .execute(Destination::Host(&mut value))
                .unwrap();
            assert_eq!(value as i64, tiles);
            assert_eq!(report.finalizations, 1, "tiles {tiles}");
            let finalizer = report.finalizer_block.unwrap();
            assert!(finalizer < report.grid);
        }
    }
}

/// D-002: float max is exact, so it must not depend on the grid
#[test]
fn test_d002_max_independent_of_grid() {
    let domain = WorkDomain::new(&[0, 0], &[123, 77], &[1, 4]).unwrap();
    let wave = |idx: &[i64], acc: &mut f64| {
        let v = ((idx[0] * 37 + idx[1] * 11) % 1009) as f64 * 0.5;
        if v > *acc {
            *acc = v;
        }
    };
    let expected = sequential_reduce(&domain, &wave, &Max::<f64>::new());
    for log2 in 2..=10 {
        let device = SimDevice::default();
        let mut value = 0.0;
        ParallelReduce::new(&device, &domain, wave, Max::<f64>::new())
            .with_config(ReduceConfig::new().with_max_block_width(1 << log2))
            .execute(Destination::Host(&mut value))
            .unwrap();
        assert_eq!(value.to_bits(), expected.to_bits());
    }
}

// =============================================================================
// SECTION E: Result delivery and faults
// =============================================================================

/// E-001: host destination is untouched until the device-to-host copy
#[test]
fn test_e001_host_written_only_by_copy() {
    let sentinel = 0xdead_beef_cafe_f00d_u64;
    let device = WatchedDevice::new(sentinel);
    let domain = WorkDomain::from_extents(&[100, 100]).unwrap();
    let mut value = sentinel;
    ParallelReduce::new(&device, &domain, ones, Sum::<u64>::new())
        .execute(Destination::Host(&mut value))
        .unwrap();
    assert!(device.untouched_at_copy.load(Ordering::SeqCst));
    assert_eq!(device.copies.load(Ordering::SeqCst), 1);
    assert_eq!(value, 10_000);
}

/// E-002: a fault in the per-element operator is reported, not retried
#[test]
fn test_e002_device_fault_is_fatal() {
    let sentinel = 77u64;
    let device = WatchedDevice::new(sentinel);
    let domain = WorkDomain::from_extents(&[64, 64]).unwrap();
    let faulty = |idx: &[i64], acc: &mut u64| {
        assert!(!(idx[0] == 40 && idx[1] == 3), "illegal address");
        *acc += 1;
    };
    let mut value = sentinel;
    let err = ParallelReduce::new(&device, &domain, faulty, Sum::<u64>::new())
        .execute(Destination::Host(&mut value))
        .unwrap_err();
    match err {
        ReduceError::Device(DeviceError::ExecutionFault { message, .. }) => {
            assert!(message.contains("illegal address"));
        }
        other => panic!("expected execution fault, got {other:?}"),
    }
    assert_eq!(device.inner.launch_count(), 1);
    assert_eq!(device.copies.load(Ordering::SeqCst), 0);
    assert_eq!(value, sentinel);
}

/// E-003: device destination is written in place and read back on demand
#[test]
fn test_e003_device_destination_reuse() {
    let device = SimDevice::default();
    let result = mdreduce::DeviceResult::<u64>::new(&device).unwrap();
    for n in [10i64, 1000, 0, 77] {
        let domain = WorkDomain::from_extents(&[n]).unwrap();
        ParallelReduce::new(&device, &domain, ones, Sum::<u64>::new())
            .execute(Destination::Device(&result))
            .unwrap();
        assert_eq!(result.read(&device).unwrap() as i64, n);
    }
}
