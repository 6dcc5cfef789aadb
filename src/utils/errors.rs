use std::fmt;
use std::error::Error;

/// Represents errors that can occur while building or stepping an ensemble.
#[derive(Debug, Clone)]
pub enum GravityError {
    /// An ensemble holds at least one body; zero-length ensembles are rejected.
    InvalidBodyCount,
    /// Indicates an invalid mass value (negative or non-finite).
    InvalidMass,
    /// Caller-supplied body arrays disagree in length with the ensemble.
    MismatchedLengths,
    /// Backing storage for the ensemble could not be obtained.
    AllocationFailed,
    /// A general error for calculations that produce invalid results.
    CalculationError(String),
}

impl fmt::Display for GravityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GravityError::InvalidBodyCount => write!(f, "Ensemble needs at least one body"),
            GravityError::InvalidMass => write!(f, "Invalid mass value"),
            GravityError::MismatchedLengths => write!(f, "Body arrays have mismatched lengths"),
            GravityError::AllocationFailed => write!(f, "Failed to allocate ensemble storage"),
            GravityError::CalculationError(msg) => write!(f, "Calculation error: {}", msg),
        }
    }
}

impl Error for GravityError {}
