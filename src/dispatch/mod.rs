//! Admission control and tracked execution of generation jobs.
mod dispatcher;
mod job;

pub use dispatcher::*;
pub use job::*;
