//! Shared progress channel and task registry.
//!
//! Provides the single multiplexed WebSocket connection that delivers
//! server-pushed [`ProgressEvent`](clipseek_core::progress::ProgressEvent)s,
//! the reconnection policy around it, frame parsing, and the
//! [`TaskRegistry`](registry::TaskRegistry) that projects the flat event
//! stream into per-task latest state.

pub mod channel;
pub mod client;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod registry;
pub mod status;
