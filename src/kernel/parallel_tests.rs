use crate::ensemble::Ensemble;
use crate::kernel::{
    accumulate_all, accumulate_partitioned, reduce_buffers, AccelBuffer, Partition, RsqrtMode,
};
use approx::assert_relative_eq;

fn pair_count(range: &std::ops::Range<usize>, n: usize) -> usize {
    range.clone().map(|row| n - 1 - row).sum()
}

#[test]
fn test_partition_covers_every_row_exactly_once() {
    for n in [1, 2, 3, 4, 5, 8, 16, 17, 63, 100, 101] {
        for threads in [1, 2, 3, 4, 7, 8, 16] {
            for stride in [1, 4] {
                let partition = Partition::new(n, threads, stride);
                let ranges = partition.ranges();

                assert!(!ranges.is_empty());
                assert!(ranges.len() <= threads);
                assert_eq!(ranges[0].start, 0);
                assert_eq!(ranges[ranges.len() - 1].end, n);
                for pair in ranges.windows(2) {
                    assert_eq!(
                        pair[0].end, pair[1].start,
                        "gap or overlap between ranges for n={}, threads={}, stride={}",
                        n, threads, stride
                    );
                }

                let covered: usize = ranges.iter().map(|r| pair_count(r, n)).sum();
                assert_eq!(covered, n * (n - 1) / 2);
            }
        }
    }
}

#[test]
fn test_partition_ranges_align_to_stride() {
    let partition = Partition::new(103, 8, 4);
    for range in &partition.ranges()[..partition.ranges().len() - 1] {
        assert_eq!(range.end % partition.stride(), 0);
    }
}

#[test]
fn test_partition_balances_pair_counts() {
    let n = 1000;
    let threads = 8;
    let partition = Partition::new(n, threads, 4);
    let total = n * (n - 1) / 2;
    let target = total / threads;

    assert_eq!(partition.ranges().len(), threads);
    for range in partition.ranges() {
        let pairs = pair_count(range, n);
        assert!(pairs > 0);
        // A range can overshoot the target by at most one stride block.
        assert!(
            pairs < 2 * target,
            "range {:?} holds {} pairs against a target of {}",
            range,
            pairs,
            target
        );
    }
}

#[test]
fn test_partitioned_accumulation_matches_sequential() {
    let n = 37;
    let mut ensemble = Ensemble::<f64>::random_cloud(n, 1.0, 8.0, 5)
        .expect("Failed to create ensemble");

    ensemble.zero_accelerations();
    {
        let (bodies, mut accel) = ensemble.split_mut();
        accumulate_all(&bodies, &mut accel);
    }
    let reference: Vec<f64> = {
        let (ax, ay, az) = ensemble.accelerations();
        ax.iter().chain(ay).chain(az).copied().collect()
    };

    let partition = Partition::new(n, 4, 1);
    let mut buffers: Vec<AccelBuffer<f64>> = partition
        .ranges()
        .iter()
        .map(|_| AccelBuffer::new(n))
        .collect();

    ensemble.zero_accelerations();
    {
        let bodies = ensemble.bodies();
        accumulate_partitioned(&bodies, &partition, &mut buffers, false, RsqrtMode::Exact);
    }
    {
        let (_, mut accel) = ensemble.split_mut();
        reduce_buffers(&mut accel, &mut buffers);
    }

    let (ax, ay, az) = ensemble.accelerations();
    let combined: Vec<f64> = ax.iter().chain(ay).chain(az).copied().collect();
    for (got, want) in combined.iter().zip(reference.iter()) {
        assert_relative_eq!(*got, *want, max_relative = 1e-12, epsilon = 1e-15);
    }
}

#[test]
fn test_reduction_zeroes_buffers_for_reuse() {
    let n = 12;
    let mut ensemble = Ensemble::<f64>::random_cloud(n, 1.0, 4.0, 21)
        .expect("Failed to create ensemble");

    let partition = Partition::new(n, 3, 1);
    let mut buffers: Vec<AccelBuffer<f64>> = partition
        .ranges()
        .iter()
        .map(|_| AccelBuffer::new(n))
        .collect();

    let run = |ensemble: &mut Ensemble<f64>, buffers: &mut Vec<AccelBuffer<f64>>| {
        ensemble.zero_accelerations();
        {
            let bodies = ensemble.bodies();
            accumulate_partitioned(&bodies, &partition, buffers, false, RsqrtMode::Exact);
        }
        let (_, mut accel) = ensemble.split_mut();
        reduce_buffers(&mut accel, buffers);
        let (ax, ay, az) = ensemble.accelerations();
        ax.iter().chain(ay).chain(az).copied().collect::<Vec<f64>>()
    };

    let first = run(&mut ensemble, &mut buffers);
    let second = run(&mut ensemble, &mut buffers);
    // Anything left in a private buffer would double up here.
    assert_eq!(first, second);
}
