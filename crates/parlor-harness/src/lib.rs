//! Deterministic test support for the chat core.
//!
//! - [`SimEnv`] replaces the system clocks with virtual time a test advances
//!   explicitly, so every timestamp and expiry check is reproducible.
//! - [`EventSink`] is a bounded outbox plus drain helpers for asserting on
//!   exactly what a room delivered.
//! - [`model`] holds a reference implementation of the directory and room
//!   rules; model-based tests drive the real system and the model with the
//!   same operations and compare.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod events;
pub mod model;
mod sim_env;

pub use events::EventSink;
pub use sim_env::{SimEnv, SimInstant};
