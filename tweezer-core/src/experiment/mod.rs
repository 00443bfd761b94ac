//! Experiment parameters, steps and schedules
//!
//! A schedule is an ordered list of steps. Each step is a bag of
//! parameter entries applied to the live parameter set at the control
//! state update boundary, plus optional ghost traps to add after lift.

pub mod layout;
pub mod params;
pub mod step;

pub use layout::{DeviceTrap, TrapLayout};
pub use params::{
    ApplyReport, ExperimentParameters, ParamKey, ParamValue, Rejection, RejectReason, StepEntry,
    Truncation, MAX_KEY_LEN, MAX_NAME_LEN,
};
pub use step::{ExperimentSchedule, ExperimentStep, GhostSpec};
