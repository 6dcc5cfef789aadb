use crate::utils::{GravityError, Real};

/// A single body in array-of-structures form.
///
/// The structure-of-arrays [`Ensemble`](crate::ensemble::Ensemble) is what
/// the kernels run against; `PointMass` is the per-body record callers tend
/// to build scenes with, and the two convert both ways.
#[derive(Debug, Clone)]
pub struct PointMass<T: Real> {
    /// Position (x, y, z).
    pub position: [T; 3],
    /// Acceleration output of the most recent step; starts zeroed.
    pub acceleration: [T; 3],
    /// Mass, read-only for the lifetime of a step.
    pub mass: T,
}

impl<T: Real> PointMass<T> {
    /// Creates a new point mass at `position`.
    ///
    /// Zero mass is allowed (such a body feels gravity but exerts none);
    /// negative or non-finite masses are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GravityError::InvalidMass`] if `mass` is negative, NaN or
    /// infinite.
    pub fn new(position: [T; 3], mass: T) -> Result<Self, GravityError> {
        if !(mass >= T::ZERO) || !mass.is_finite() {
            return Err(GravityError::InvalidMass);
        }
        Ok(PointMass {
            position,
            acceleration: [T::ZERO; 3],
            mass,
        })
    }
}
