//! The pair-update primitive and the sequential all-pairs driver.
//!
//! Everything else in the crate is a faster way of arranging calls to
//! [`update_pair`]: the vectorized drivers batch it across SIMD lanes and the
//! partitioned driver spreads disjoint row ranges of it over worker threads.

use crate::ensemble::{Accels, Bodies};
use crate::utils::Real;
use std::ops::Range;

/// Accumulates the mutual gravitational acceleration of the pair `(i, j)`.
///
/// Requires `i < j`. With `d = r[i] - r[j]` and `s = |d|^2`, body `j` gains
/// `(g * m[i] / s) * d/|d|` and body `i` loses `(g * m[j] / s) * d/|d|`:
/// equal and opposite forces by construction.
///
/// Coincident bodies make `s` zero and the division by zero propagates as
/// infinity or NaN. That is deliberate; keeping bodies apart is a caller
/// invariant, and [`Ensemble::accelerations_finite`](crate::ensemble::Ensemble::accelerations_finite)
/// exists for callers that need to detect the fallout.
#[inline]
pub fn update_pair<T: Real>(bodies: &Bodies<'_, T>, accel: &mut Accels<'_, T>, i: usize, j: usize) {
    let dx = bodies.rx[i] - bodies.rx[j];
    let dy = bodies.ry[i] - bodies.ry[j];
    let dz = bodies.rz[i] - bodies.rz[j];

    let d2 = dx * dx + dy * dy + dz * dz;
    let g_d2 = bodies.g / d2;

    let aj = g_d2 * bodies.m[i];
    let ai = g_d2 * bodies.m[j];

    let inv_d = T::ONE / d2.sqrt();
    let ux = dx * inv_d;
    let uy = dy * inv_d;
    let uz = dz * inv_d;

    accel.ax[j] += aj * ux;
    accel.ay[j] += aj * uy;
    accel.az[j] += aj * uz;

    accel.ax[i] -= ai * ux;
    accel.ay[i] -= ai * uy;
    accel.az[i] -= ai * uz;
}

/// Visits every pair `(i, j)` with `i` in `rows` and `i < j < n` exactly once.
///
/// The full triangle is `rows = 0..n`; the partitioned driver hands each
/// worker a disjoint sub-range of rows so their pair sets never overlap.
pub fn accumulate_rows<T: Real>(bodies: &Bodies<'_, T>, accel: &mut Accels<'_, T>, rows: Range<usize>) {
    let n = bodies.len();
    for i in rows {
        for j in (i + 1)..n {
            update_pair(bodies, accel, i, j);
        }
    }
}

/// Sequential all-pairs sweep: every unordered pair once, `n * (n - 1) / 2`
/// calls of the primitive. The accumulators must already be zeroed.
pub fn accumulate_all<T: Real>(bodies: &Bodies<'_, T>, accel: &mut Accels<'_, T>) {
    let n = bodies.len();
    accumulate_rows(bodies, accel, 0..n);
}
