//! Asynchronous subprocess execution with captured output.

pub mod runner;

pub use runner::{retry, run_cmd, CommandError, CommandOutput, CommandRunner, RunOptions};
