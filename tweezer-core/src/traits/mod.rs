//! Collaborator traits
//!
//! These traits define the interface between the decision logic and the
//! rig hardware (or a simulation of it). Every call returns a typed
//! result so a disconnected device degrades a feature instead of
//! stopping the loop.

pub mod camera;
pub mod recorder;
pub mod slm;
pub mod stage;
pub mod thermostat;

pub use camera::{Camera, CameraError, Detector, Frame};
pub use recorder::{Recorder, RecorderError, SnapshotLabel};
pub use slm::{HologramService, HologramSettings, SlmError};
pub use stage::{StageDriver, StageError, StagePosition};
pub use thermostat::{SensorError, TemperatureController, TemperatureReading};
