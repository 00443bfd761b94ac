//! Decision-layer configuration types
//!
//! Tuning for the sequencer, planner, search scan and particle detection.
//! Defaults match the rig's calibrated values.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sequencer thresholds and patience limits
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SequencerConfig {
    /// A particle closer than this to a trap occupies it (px)
    pub movement_threshold_px: f32,
    /// Free particles beyond this are not matched to empty traps (px)
    pub match_cutoff_px: f32,
    /// Per-axis move limit while any trap holds a particle (px)
    pub guarded_move_limit_px: f32,
    /// Per-axis move limit while every trap is empty (px)
    pub free_move_limit_px: f32,
    /// Traps enabled first when activating one at a time
    pub initial_trap_batch: usize,
    /// Traps added each time the active ones are all filled
    pub trap_batch: usize,
    /// z raise per lifting tick (motor ticks)
    pub lift_step_ticks: i32,
    /// Incomplete-occupancy ticks tolerated while lifting
    pub lift_patience: u32,
    /// Incomplete-occupancy ticks tolerated while recording
    pub recording_patience: u32,
    /// Leftover recording time below this counts as finished (ms)
    pub min_remaining_ms: u64,
    /// Ticks to wait for a new phase mask
    pub phasemask_wait_ticks: u32,
    /// Ticks to wait for the temperature to settle
    pub temperature_wait_ticks: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            movement_threshold_px: 30.0,
            match_cutoff_px: 2000.0,
            guarded_move_limit_px: 40.0,
            free_move_limit_px: 1200.0,
            initial_trap_batch: 3,
            trap_batch: 1,
            lift_step_ticks: 40,
            lift_patience: 3,
            recording_patience: 50,
            min_remaining_ms: 1000,
            phasemask_wait_ticks: 100,
            temperature_wait_ticks: 2000,
        }
    }
}

/// Path planner grid settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlannerConfig {
    /// Grid cell width (px)
    pub cell_width: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { cell_width: 32 }
    }
}

/// Direction of the search scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScanDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Boustrophedon search scan settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanConfig {
    /// Stage move per scan tick (px)
    pub step_px: f32,
    /// Height of the scanned band above the start position (mm)
    pub y_span_mm: f32,
    /// Sideways shift between scan columns (mm)
    pub x_step_mm: f32,
    /// Direction at program start
    pub initial_direction: ScanDirection,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            step_px: 300.0,
            y_span_mm: 3.0,
            x_step_mm: 0.005,
            initial_direction: ScanDirection::Up,
        }
    }
}

/// Threshold particle detection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectionConfig {
    /// Intensity threshold separating particle from background
    pub threshold: u8,
    /// Blobs must be larger than this many pixels
    pub size_threshold: u32,
    /// Blobs must be smaller than this many pixels
    pub upper_size_threshold: u32,
    /// Particles are brighter than the background
    pub bright_particle: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 100,
            size_threshold: 200,
            upper_size_threshold: 5000,
            bright_particle: true,
        }
    }
}
