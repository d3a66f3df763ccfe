//! Spreadsheet change watcher.
//!
//! Polls a table, detects per-cell changes against a durable baseline cache,
//! and for every rule whose trigger columns changed (or whose destination
//! cell is still empty) asks a completion service for text and writes it back
//! into the destination cell.
//!
//! External dependencies are rate limited independently, writes to the same
//! cell are serialized, and generation work runs on a bounded worker pool.
mod cache;
mod concurrency;
mod config;
mod constants;
mod dispatch;
mod engine;
mod errors;
mod network;
mod rules;
mod sheet;
mod writer;

pub mod metrics;
pub mod utils;

pub use cache::*;
pub use concurrency::*;
pub use config::*;
pub use constants::*;
pub use dispatch::*;
pub use engine::*;
pub use errors::*;
pub use metrics::*;
pub use network::*;
pub use rules::*;
pub use sheet::*;
pub use utils::*;
pub use writer::*;

//-----------------------------------------------------------
// Test utils

#[doc(hidden)]
pub mod test_utils;
