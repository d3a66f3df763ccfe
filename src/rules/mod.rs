//! Rule definitions and trigger evaluation.
mod evaluator;
mod rule;
mod rule_set;
mod settings;

pub use evaluator::*;
pub use rule::*;
pub use rule_set::*;
pub use settings::*;

#[cfg(test)]
mod settings_test;
