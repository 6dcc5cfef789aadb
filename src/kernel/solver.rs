//! Step orchestration: variant selection, cached partitioning and the
//! zero / accumulate / reduce sequence of one timestep.

use crate::ensemble::Ensemble;
use crate::kernel::pairwise;
use crate::kernel::parallel::{accumulate_partitioned, reduce_buffers, AccelBuffer, Partition};
use crate::kernel::simd::{RsqrtMode, SimdAccumulate};
use crate::utils::GravityError;
use log::warn;

/// Accumulation sweep variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// One pair at a time on the pair-update primitive.
    #[default]
    Scalar,
    /// The lane-batched vector kernel for the ensemble's precision, when the
    /// running CPU supports it; otherwise the scalar driver with a warning.
    Simd,
}

/// Configuration fixed when a solver is created. The variant grid is
/// precision (the solver's type parameter) by backend by thread count.
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    /// Accumulation sweep variant.
    pub backend: Backend,
    /// Worker count for the partitioned driver. `1` keeps the whole sweep on
    /// the calling thread; `0` uses rayon's current pool size.
    pub threads: usize,
    /// Reciprocal square root strategy; only the single-precision vector
    /// kernel distinguishes the two, everything else computes exactly.
    pub rsqrt: RsqrtMode,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            backend: Backend::Scalar,
            threads: 1,
            rsqrt: RsqrtMode::Exact,
        }
    }
}

struct Plan<T: SimdAccumulate> {
    n: usize,
    use_simd: bool,
    partition: Option<Partition>,
    buffers: Vec<AccelBuffer<T>>,
}

impl<T: SimdAccumulate> Plan<T> {
    fn new(options: &SolverOptions, n: usize) -> Self {
        let use_simd = match options.backend {
            Backend::Scalar => false,
            Backend::Simd => {
                let supported = T::simd_supported();
                if !supported {
                    warn!("vector kernel unavailable on this CPU, using the scalar driver");
                }
                supported
            }
        };

        let workers = if options.threads == 0 {
            rayon::current_num_threads()
        } else {
            options.threads
        };
        let stride = if use_simd { T::LANES } else { 1 };

        let (partition, buffers) = if workers > 1 {
            let partition = Partition::new(n, workers, stride);
            let buffers = partition
                .ranges()
                .iter()
                .map(|_| AccelBuffer::new(n))
                .collect();
            (Some(partition), buffers)
        } else {
            (None, Vec::new())
        };

        Plan {
            n,
            use_simd,
            partition,
            buffers,
        }
    }
}

/// Recomputes ensemble accelerations, one full pairwise sweep per call.
///
/// The solver owns everything a step needs besides the ensemble itself:
/// the resolved sweep variant and, for the partitioned driver, the cached
/// row partition and private buffers. The cache is keyed on the ensemble
/// size and rebuilt transparently when a differently sized ensemble comes
/// along.
///
/// # Examples
///
/// ```
/// use rs_gravity::ensemble::{Ensemble, PointMass};
/// use rs_gravity::kernel::{Backend, Solver, SolverOptions};
///
/// let bodies = [
///     PointMass::new([0.0, 0.0, 0.0], 1.0).unwrap(),
///     PointMass::new([1.0, 0.0, 0.0], 1.0).unwrap(),
///     PointMass::new([0.0, 1.0, 0.0], 1.0).unwrap(),
/// ];
/// let mut ensemble = Ensemble::<f64>::from_point_masses(&bodies, 1.0)
///     .expect("Failed to allocate ensemble");
///
/// let mut solver = Solver::new(SolverOptions {
///     backend: Backend::Scalar,
///     threads: 2,
///     ..SolverOptions::default()
/// });
/// solver.step(&mut ensemble).expect("Step failed");
/// assert!(ensemble.accelerations_finite());
/// ```
pub struct Solver<T: SimdAccumulate> {
    options: SolverOptions,
    plan: Option<Plan<T>>,
}

impl<T: SimdAccumulate> Solver<T> {
    pub fn new(options: SolverOptions) -> Self {
        Solver {
            options,
            plan: None,
        }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Recomputes the acceleration of every body from the current positions
    /// and masses.
    ///
    /// The output arrays are zeroed first, so two steps over unchanged
    /// positions produce identical results; nothing accumulates across
    /// calls. For the partitioned driver the sequence is: zero the output,
    /// accumulate disjoint row ranges into private buffers, join, reduce the
    /// buffers into the output and clear them for reuse.
    pub fn step(&mut self, ensemble: &mut Ensemble<T>) -> Result<(), GravityError> {
        let rsqrt = self.options.rsqrt;

        if self.plan.as_ref().map_or(true, |plan| plan.n != ensemble.len()) {
            self.plan = Some(Plan::new(&self.options, ensemble.len()));
        }

        if let Some(plan) = self.plan.as_mut() {
            ensemble.zero_accelerations();

            match plan.partition.as_ref() {
                None => {
                    let (bodies, mut accel) = ensemble.split_mut();
                    if plan.use_simd {
                        T::accumulate_simd(&bodies, &mut accel, 0..bodies.len(), rsqrt);
                    } else {
                        pairwise::accumulate_all(&bodies, &mut accel);
                    }
                }
                Some(partition) => {
                    {
                        let bodies = ensemble.bodies();
                        accumulate_partitioned(
                            &bodies,
                            partition,
                            &mut plan.buffers,
                            plan.use_simd,
                            rsqrt,
                        );
                    }
                    let (_, mut accel) = ensemble.split_mut();
                    reduce_buffers(&mut accel, &mut plan.buffers);
                }
            }
        }

        Ok(())
    }
}
