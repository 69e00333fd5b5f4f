//! Test doubles and fixtures.
//!
//! Public so benchmarks and downstream crates can reuse them.

mod fixtures;
mod mocks;

pub use fixtures::{synthetic_table, write_synthetic_csv};
pub use mocks::{CountingStage, FailingStage, FlakyStage};
