//! Shared domain types for the clipseek task orchestration client.
//!
//! This crate has no internal dependencies so it can be used by the
//! progress channel, the task runner, the search layer and the CLI alike.

pub mod error;
pub mod progress;
pub mod search;
pub mod types;
