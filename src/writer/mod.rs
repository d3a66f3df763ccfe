//! Write-back path into the data source.
mod retrying_writer;

pub use retrying_writer::*;
