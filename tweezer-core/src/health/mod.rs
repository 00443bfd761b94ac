//! Hardware health monitoring
//!
//! Tracks collaborator connectivity. Nothing here is fatal: a lost
//! device only disables the features that depend on it.

pub mod monitor;

pub use monitor::{Capabilities, Device, HealthChange, HealthMonitor, HealthStatus, FRAME_STALE_MS};
