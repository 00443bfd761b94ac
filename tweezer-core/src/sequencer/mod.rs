//! Experiment sequencer
//!
//! Drives capture → lift → record → advance through the schedule. The
//! runner is tick based and does no I/O: each tick takes an
//! `Observation` snapshot of the control state and returns the phase
//! plus the intents the caller should apply and notices it should log.

pub mod runner;
pub mod types;

pub use runner::ExperimentRunner;
pub use types::{Intent, Notice, Observation, RunnerConfig, Tick, WaitKind, MAX_INTENTS, MAX_NOTICES};
