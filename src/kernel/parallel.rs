//! Static work partitioning, thread-private accumulators and the reduction
//! that folds them back into the shared output.
//!
//! The pair space is triangular: row `j` contributes `n - 1 - j` pairs, so
//! equal row counts make unequal work. The partitioner walks the rows once,
//! accumulating pair counts, and closes a worker's range whenever it reaches
//! its share. Workers never write shared memory during accumulation; each
//! owns a private buffer and the single-threaded reduction after the join is
//! the only step that touches the ensemble's output arrays.

use crate::ensemble::{Accels, Bodies};
use crate::kernel::pairwise;
use crate::kernel::simd::{RsqrtMode, SimdAccumulate};
use crate::utils::Real;
use log::debug;
use rayon::prelude::*;
use std::ops::Range;

/// Contiguous row ranges with near-equal pair counts, one per worker.
///
/// A one-time computation per ensemble configuration; the solver caches it
/// instead of recomputing every step.
#[derive(Debug, Clone)]
pub struct Partition {
    ranges: Vec<Range<usize>>,
    stride: usize,
}

impl Partition {
    /// Splits the `n * (n - 1) / 2` pair triangle of `n` bodies into at most
    /// `threads` contiguous row ranges of roughly equal pair count.
    ///
    /// The walk advances in `stride`-row blocks so ranges stay aligned to a
    /// vectorized worker's batch width; the final range absorbs whatever
    /// remains. The union of the ranges always covers rows `0..n` exactly
    /// once, whatever the divisibility of `n` by `threads` or `stride`.
    pub fn new(n: usize, threads: usize, stride: usize) -> Self {
        let threads = threads.max(1);
        let stride = stride.max(1);
        let total = n * (n - 1) / 2;
        let target = (total / threads).max(1);

        let mut ranges = Vec::with_capacity(threads);
        let mut start = 0_usize;
        let mut pairs = 0_usize;
        let mut j = 0_usize;
        while j < n {
            let block_end = (j + stride).min(n);
            for row in j..block_end {
                pairs += n - 1 - row;
            }
            j = block_end;
            if pairs >= target && ranges.len() + 1 < threads {
                ranges.push(start..j);
                start = j;
                pairs = 0;
            }
        }
        if start < n || ranges.is_empty() {
            ranges.push(start..n);
        }

        debug!(
            "partitioned {} pairs over {} bodies into {} ranges (stride {})",
            total,
            n,
            ranges.len(),
            stride
        );
        Partition { ranges, stride }
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Thread-private acceleration accumulator, one per partition range.
///
/// Sized like the ensemble so a worker can accumulate any pair it owns
/// without coordinating with the others.
#[derive(Debug)]
pub struct AccelBuffer<T: Real> {
    ax: Vec<T>,
    ay: Vec<T>,
    az: Vec<T>,
}

impl<T: Real> AccelBuffer<T> {
    pub fn new(n: usize) -> Self {
        AccelBuffer {
            ax: vec![T::ZERO; n],
            ay: vec![T::ZERO; n],
            az: vec![T::ZERO; n],
        }
    }

    pub fn accels(&mut self) -> Accels<'_, T> {
        Accels {
            ax: &mut self.ax,
            ay: &mut self.ay,
            az: &mut self.az,
        }
    }
}

/// Runs every partition range against its private buffer on the rayon pool.
///
/// Ranges are disjoint by construction and each worker writes only its own
/// buffer, so the accumulation phase is lock-free; the implicit join of the
/// parallel iterator is the barrier before reduction.
pub fn accumulate_partitioned<T: SimdAccumulate>(
    bodies: &Bodies<'_, T>,
    partition: &Partition,
    buffers: &mut [AccelBuffer<T>],
    use_simd: bool,
    mode: RsqrtMode,
) {
    debug_assert_eq!(buffers.len(), partition.ranges().len());
    buffers
        .par_iter_mut()
        .zip(partition.ranges().par_iter())
        .for_each(|(buffer, range)| {
            let mut accel = buffer.accels();
            if use_simd {
                T::accumulate_simd(bodies, &mut accel, range.clone(), mode);
            } else {
                pairwise::accumulate_rows(bodies, &mut accel, range.clone());
            }
        });
}

/// Sums the private buffers element-wise into `accel`, zeroing each buffer
/// as it goes so reuse on the next step starts clean.
pub fn reduce_buffers<T: Real>(accel: &mut Accels<'_, T>, buffers: &mut [AccelBuffer<T>]) {
    for buffer in buffers.iter_mut() {
        for (dst, src) in accel.ax.iter_mut().zip(buffer.ax.iter_mut()) {
            *dst += *src;
            *src = T::ZERO;
        }
        for (dst, src) in accel.ay.iter_mut().zip(buffer.ay.iter_mut()) {
            *dst += *src;
            *src = T::ZERO;
        }
        for (dst, src) in accel.az.iter_mut().zip(buffer.az.iter_mut()) {
            *dst += *src;
            *src = T::ZERO;
        }
    }
}
