mod pairwise;
mod parallel;
mod simd;
mod solver;

pub use pairwise::*;
pub use parallel::*;
pub use simd::*;
pub use solver::*;

#[cfg(test)]
mod parallel_tests;
#[cfg(test)]
mod solver_tests;
