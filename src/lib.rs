//! Work timer for tasks. Each task keeps a log of timed entries, grouped into chapters by
//! headers, and at most one entry across all tasks is ever running.
//!
//! The [engine] holds the timer logic and never touches the disk. [persistence] writes tasks and
//! the timer pointer in the background, and [app] ties both together for one run of the CLI.

pub mod app;
pub mod cli;
pub mod engine;
pub mod fs;
pub mod model;
pub mod persistence;
pub mod store;
pub mod utils;
