//! Trap layout: programmed traps, active prefix and ghost traps

use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::params::ExperimentParameters;
use crate::geometry::{Aoi, Point, SlmCalibration};

/// A trap in SLM device coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceTrap {
    pub xm: f32,
    pub ym: f32,
    pub zm: f32,
}

/// The traps the hologram should currently render
///
/// Traps are enabled as a prefix of the programmed set. Ghost traps are
/// appended after the active prefix; they hold no particle and are
/// always treated as occupied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrapLayout {
    full: Vec<DeviceTrap>,
    active: usize,
    ghosts: Vec<DeviceTrap>,
}

impl TrapLayout {
    pub fn new(full: Vec<DeviceTrap>) -> Self {
        let active = full.len();
        Self {
            full,
            active,
            ghosts: Vec::new(),
        }
    }

    /// Layout for the programmed traps of a parameter set, all active
    pub fn from_parameters(params: &ExperimentParameters) -> Self {
        let full = params
            .xm
            .iter()
            .zip(params.ym.iter())
            .enumerate()
            .map(|(i, (&xm, &ym))| DeviceTrap {
                xm,
                ym,
                zm: params.zm.get(i).copied().unwrap_or(0.0),
            })
            .collect();
        Self::new(full)
    }

    pub fn full_count(&self) -> usize {
        self.full.len()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    /// Active traps plus ghosts
    pub fn len(&self) -> usize {
        self.active + self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every programmed trap is enabled
    pub fn fully_active(&self) -> bool {
        self.active >= self.full.len()
    }

    /// Enable the first `n` programmed traps; returns the clamped count
    pub fn set_active(&mut self, n: usize) -> usize {
        self.active = n.min(self.full.len());
        self.active
    }

    pub fn add_ghosts(&mut self, ghosts: &[DeviceTrap]) {
        self.ghosts.extend_from_slice(ghosts);
    }

    pub fn clear_ghosts(&mut self) {
        self.ghosts.clear();
    }

    /// Traps to render, in order: active prefix then ghosts
    pub fn active_traps(&self) -> Vec<DeviceTrap> {
        self.full[..self.active]
            .iter()
            .chain(self.ghosts.iter())
            .copied()
            .collect()
    }

    /// Absolute sensor positions of the rendered traps
    pub fn absolute_pixels(&self, calibration: &SlmCalibration) -> Vec<Point> {
        self.full[..self.active]
            .iter()
            .chain(self.ghosts.iter())
            .map(|t| calibration.device_to_pixel(t.xm, t.ym))
            .collect()
    }

    /// AOI-relative positions of the rendered traps
    pub fn pixel_positions(&self, calibration: &SlmCalibration, aoi: &Aoi) -> Vec<Point> {
        self.absolute_pixels(calibration)
            .into_iter()
            .map(|p| aoi.to_relative(p))
            .collect()
    }
}
