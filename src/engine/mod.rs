//! Poll driver and top-level wiring.
//!
//! [`PollLoop`] owns the per-cycle state machine; [`EngineBuilder`] wires it
//! to the dispatcher, writer, cache and external collaborators, and
//! [`Engine`] exposes the resulting lifecycle (run, shutdown).
mod builder;
#[allow(clippy::module_inception)]
mod engine;
mod poll_loop;

pub use builder::*;
pub use engine::*;
pub use poll_loop::*;
