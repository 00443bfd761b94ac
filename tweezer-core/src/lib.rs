//! Hardware-agnostic core logic for the optical tweezer rig
//!
//! This crate contains all decision logic that does not depend on
//! specific hardware implementations:
//!
//! - Pixel/device geometry and camera regions
//! - Particle to trap assignment
//! - Collision-avoiding grid path planning
//! - Search scan and focus compensation
//! - Experiment parameters and schedules
//! - Phase state machine and the experiment sequencer
//! - Hardware health monitoring
//! - Configuration type definitions
//! - Collaborator traits (camera, detector, stage, SLM, thermostat, recorder)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod assignment;
pub mod config;
pub mod experiment;
pub mod geometry;
pub mod health;
pub mod motion;
pub mod planner;
pub mod sequencer;
pub mod state;
pub mod traits;
