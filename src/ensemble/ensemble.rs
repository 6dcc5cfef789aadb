//! Structure-of-arrays storage for a fixed-size collection of point masses.
//!
//! Positions and masses are the read-only inputs of a step; the acceleration
//! arrays are outputs, zeroed and fully recomputed on every call. Storage is
//! allocated once up front, reused across steps, and released when the
//! ensemble is dropped.
//!
//! # Example
//!
//! ```
//! use rs_gravity::ensemble::Ensemble;
//! use rs_gravity::kernel::{Solver, SolverOptions};
//!
//! // Two unit masses one length unit apart, G = 1.
//! let mut ensemble = Ensemble::<f64>::new(2, 1.0)
//!     .expect("Failed to allocate ensemble");
//! {
//!     let (rx, _ry, _rz) = ensemble.positions_mut();
//!     rx[1] = 1.0;
//! }
//! for m in ensemble.masses_mut() {
//!     *m = 1.0;
//! }
//!
//! let mut solver = Solver::new(SolverOptions::default());
//! solver.step(&mut ensemble).expect("Step failed");
//!
//! // Each body accelerates toward the other with magnitude G * m / r^2 = 1.
//! let (ax, _, _) = ensemble.accelerations();
//! assert!((ax[0] - 1.0).abs() < 1e-12);
//! assert!((ax[1] + 1.0).abs() < 1e-12);
//! ```

use crate::ensemble::PointMass;
use crate::utils::{GravityError, Real};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Read-only view of the per-body inputs of one step: positions, masses and
/// the shared gravitational constant. Cheap to copy and safe to share across
/// worker threads, since nothing writes these arrays during a step.
#[derive(Clone, Copy)]
pub struct Bodies<'a, T: Real> {
    pub rx: &'a [T],
    pub ry: &'a [T],
    pub rz: &'a [T],
    pub m: &'a [T],
    pub g: T,
}

impl<'a, T: Real> Bodies<'a, T> {
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Mutable view of a set of acceleration accumulators. Either the ensemble's
/// own output arrays or a thread-private buffer.
pub struct Accels<'a, T: Real> {
    pub ax: &'a mut [T],
    pub ay: &'a mut [T],
    pub az: &'a mut [T],
}

/// A fixed-size collection of point masses in structure-of-arrays layout.
///
/// Attribute arrays are contiguous and all exactly `len()` long. The
/// acceleration arrays belong to the kernels: they are overwritten on every
/// step and never carry state between steps. Positions and masses may be
/// mutated by the caller between steps through the `_mut` accessors.
pub struct Ensemble<T: Real> {
    rx: Vec<T>,
    ry: Vec<T>,
    rz: Vec<T>,
    ax: Vec<T>,
    ay: Vec<T>,
    az: Vec<T>,
    m: Vec<T>,
    g: T,
}

fn alloc_array<T: Real>(n: usize) -> Result<Vec<T>, GravityError> {
    let mut array = Vec::new();
    array
        .try_reserve_exact(n)
        .map_err(|_| GravityError::AllocationFailed)?;
    array.resize(n, T::ZERO);
    Ok(array)
}

impl<T: Real> Ensemble<T> {
    /// Allocates storage for `n` bodies with all attributes zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`GravityError::InvalidBodyCount`] for `n == 0` and
    /// [`GravityError::AllocationFailed`] if the backing storage cannot be
    /// obtained.
    pub fn new(n: usize, g: T) -> Result<Self, GravityError> {
        if n == 0 {
            return Err(GravityError::InvalidBodyCount);
        }
        Ok(Ensemble {
            rx: alloc_array(n)?,
            ry: alloc_array(n)?,
            rz: alloc_array(n)?,
            ax: alloc_array(n)?,
            ay: alloc_array(n)?,
            az: alloc_array(n)?,
            m: alloc_array(n)?,
            g,
        })
    }

    /// Builds an ensemble from array-of-structures records.
    ///
    /// # Errors
    ///
    /// Returns [`GravityError::InvalidBodyCount`] for an empty slice,
    /// [`GravityError::InvalidMass`] for a negative or non-finite mass, or
    /// [`GravityError::AllocationFailed`].
    pub fn from_point_masses(bodies: &[PointMass<T>], g: T) -> Result<Self, GravityError> {
        let mut ensemble = Self::new(bodies.len(), g)?;
        ensemble.load_point_masses(bodies)?;
        Ok(ensemble)
    }

    /// Builds a deterministic random ensemble: positions uniform in a cube of
    /// half-width `radius` around the origin, masses uniform in `[0.1, 1.0)`.
    /// Useful for cross-checking drivers and for benchmarks.
    pub fn random_cloud(n: usize, g: T, radius: f64, seed: u64) -> Result<Self, GravityError> {
        if radius <= 0.0 {
            return Err(GravityError::CalculationError(
                "radius must be positive".to_string(),
            ));
        }
        let mut ensemble = Self::new(n, g)?;
        let mut rng = StdRng::seed_from_u64(seed);
        for k in 0..n {
            ensemble.rx[k] = T::from_f64(rng.random_range(-radius..radius));
            ensemble.ry[k] = T::from_f64(rng.random_range(-radius..radius));
            ensemble.rz[k] = T::from_f64(rng.random_range(-radius..radius));
            ensemble.m[k] = T::from_f64(rng.random_range(0.1..1.0));
        }
        Ok(ensemble)
    }

    /// Copies positions and masses from `bodies` into the ensemble arrays.
    ///
    /// # Errors
    ///
    /// Returns [`GravityError::MismatchedLengths`] if `bodies` is not exactly
    /// `len()` long and [`GravityError::InvalidMass`] for a negative or
    /// non-finite mass. The ensemble is unchanged on error.
    pub fn load_point_masses(&mut self, bodies: &[PointMass<T>]) -> Result<(), GravityError> {
        if bodies.len() != self.len() {
            return Err(GravityError::MismatchedLengths);
        }
        for body in bodies {
            if !(body.mass >= T::ZERO) || !body.mass.is_finite() {
                return Err(GravityError::InvalidMass);
            }
        }
        for (k, body) in bodies.iter().enumerate() {
            self.rx[k] = body.position[0];
            self.ry[k] = body.position[1];
            self.rz[k] = body.position[2];
            self.m[k] = body.mass;
        }
        Ok(())
    }

    /// Copies the acceleration arrays back out into `bodies`.
    ///
    /// # Errors
    ///
    /// Returns [`GravityError::MismatchedLengths`] if `bodies` is not exactly
    /// `len()` long.
    pub fn store_accelerations(&self, bodies: &mut [PointMass<T>]) -> Result<(), GravityError> {
        if bodies.len() != self.len() {
            return Err(GravityError::MismatchedLengths);
        }
        for (k, body) in bodies.iter_mut().enumerate() {
            body.acceleration = [self.ax[k], self.ay[k], self.az[k]];
        }
        Ok(())
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// The shared gravitational constant.
    pub fn g(&self) -> T {
        self.g
    }

    pub fn positions(&self) -> (&[T], &[T], &[T]) {
        (&self.rx, &self.ry, &self.rz)
    }

    pub fn positions_mut(&mut self) -> (&mut [T], &mut [T], &mut [T]) {
        (&mut self.rx, &mut self.ry, &mut self.rz)
    }

    pub fn masses(&self) -> &[T] {
        &self.m
    }

    pub fn masses_mut(&mut self) -> &mut [T] {
        &mut self.m
    }

    pub fn accelerations(&self) -> (&[T], &[T], &[T]) {
        (&self.ax, &self.ay, &self.az)
    }

    /// Read-only view of positions, masses and `g` for the kernels.
    pub fn bodies(&self) -> Bodies<'_, T> {
        Bodies {
            rx: &self.rx,
            ry: &self.ry,
            rz: &self.rz,
            m: &self.m,
            g: self.g,
        }
    }

    /// Splits the ensemble into its read-only inputs and its mutable
    /// acceleration output so a kernel can hold both at once.
    pub fn split_mut(&mut self) -> (Bodies<'_, T>, Accels<'_, T>) {
        (
            Bodies {
                rx: &self.rx,
                ry: &self.ry,
                rz: &self.rz,
                m: &self.m,
                g: self.g,
            },
            Accels {
                ax: &mut self.ax,
                ay: &mut self.ay,
                az: &mut self.az,
            },
        )
    }

    /// Clears the acceleration output. Every step starts here so no stale
    /// values can leak between steps.
    pub fn zero_accelerations(&mut self) {
        self.ax.fill(T::ZERO);
        self.ay.fill(T::ZERO);
        self.az.fill(T::ZERO);
    }

    /// Whether every acceleration component is finite. Coincident bodies
    /// divide by zero and the resulting inf/NaN propagates into the output
    /// by contract; this is the check callers run when that matters.
    pub fn accelerations_finite(&self) -> bool {
        self.ax.iter().all(|a| a.is_finite())
            && self.ay.iter().all(|a| a.is_finite())
            && self.az.iter().all(|a| a.is_finite())
    }
}
