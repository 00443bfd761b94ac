//! Experiment phase state machine
//!
//! Defines the authoritative phase sequencing of the experiment loop.
//! The machine is explicit, finite, and deterministic.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::Phase;
