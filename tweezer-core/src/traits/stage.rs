//! Motorized stage trait
//!
//! The stage carries the sample in x/y (millimetres) and the objective in
//! z (motor ticks). Some rigs have no z encoder; `position` then reports
//! `z_ticks: None` and the caller tracks commanded z itself.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors that can occur with stage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StageError {
    /// Controller not connected
    NotConnected,
    /// Communication with the controller failed
    CommunicationError,
    /// Requested position outside travel
    OutOfRange,
}

/// Absolute stage position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StagePosition {
    pub x_mm: f32,
    pub y_mm: f32,
    /// None when the z axis has no encoder
    pub z_ticks: Option<i32>,
}

/// Trait for stage controllers
pub trait StageDriver {
    /// Relative x/y move
    fn move_xy(&mut self, dx_mm: f32, dy_mm: f32) -> Result<(), StageError>;

    /// Relative z move
    fn move_z_by(&mut self, ticks: i32) -> Result<(), StageError>;

    /// Absolute z move
    fn move_z_to(&mut self, ticks: i32) -> Result<(), StageError>;

    /// Current position
    fn position(&self) -> Result<StagePosition, StageError>;
}
