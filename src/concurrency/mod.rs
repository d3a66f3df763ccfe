//! Shared primitives bounding how hard and how concurrently the engine hits
//! its external dependencies.
mod cell_lock;
mod rate_limiter;

pub use cell_lock::*;
pub use rate_limiter::*;
