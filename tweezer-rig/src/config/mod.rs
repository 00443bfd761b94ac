//! Configuration module
//!
//! Rig configuration and experiment schedules, both read from TOML.

mod loader;
mod schedule;

pub use loader::{RigConfig, RuntimeConfig, SimulationConfig};
pub use schedule::{parse_schedule, LoadedSchedule};
