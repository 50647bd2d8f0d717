//! Terminal I/O for the planner.

pub mod cli;
pub mod input;

pub use cli::CliChannel;
pub use input::{Input, InputParser};
