//! Library half of the `clipseek` binary: configuration, argument
//! parsing and progress reporting, kept here so they can be tested.

pub mod args;
pub mod config;
pub mod monitor;
