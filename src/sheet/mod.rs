//! Spreadsheet addressing and row snapshots.
//!
//! Translates the raw table returned by the data source into immutable
//! [`RowSnapshot`]s, and cell positions into A1 ranges for write-back.
mod cell;
mod column;
mod snapshot;

pub use cell::*;
pub use column::*;
pub use snapshot::*;

#[cfg(test)]
mod sheet_test;
