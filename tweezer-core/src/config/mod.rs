//! Configuration types
//!
//! Board-agnostic configuration structures, deserializable from the rig
//! configuration file when the `serde` feature is enabled.

pub mod hardware;
pub mod types;

pub use hardware::*;
pub use types::*;
