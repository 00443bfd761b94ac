//! Simulated rig collaborators
//!
//! This crate provides implementations of the traits defined in
//! tweezer-core that run against a shared in-memory sample instead of
//! hardware:
//!
//! - Sample model (particles, traps, stage offset, focus)
//! - Camera rendering the sample and a threshold particle detector
//! - Stage with optional z encoder
//! - SLM that moves the trap sites in the sample
//! - Temperature controller with first-order settling
//! - Frame-counting recorder

#![deny(unsafe_code)]

pub mod camera;
pub mod detector;
pub mod recorder;
pub mod sample;
pub mod slm;
pub mod stage;
pub mod thermostat;

pub use camera::SimCamera;
pub use detector::ThresholdDetector;
pub use recorder::{RecordingSummary, SimRecorder};
pub use sample::{shared, SampleConfig, SampleModel, SharedSample};
pub use slm::SimSlm;
pub use stage::SimStage;
pub use thermostat::{SimThermostat, ThermostatConfig};
