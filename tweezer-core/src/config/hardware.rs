//! Hardware configuration types
//!
//! Camera geometry, stage scaling and focus drift coefficients.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Aoi;

/// Supported camera models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CameraModel {
    #[default]
    Basler,
    Thorlabs,
}

impl CameraModel {
    /// Full sensor readout in pixels
    pub const fn sensor(self) -> Aoi {
        match self {
            CameraModel::Basler => Aoi::full(672, 512),
            CameraModel::Thorlabs => Aoi::full(1200, 1000),
        }
    }

    /// AOI edges must be multiples of this
    pub const fn aoi_granularity(self) -> u32 {
        match self {
            CameraModel::Basler => 16,
            CameraModel::Thorlabs => 20,
        }
    }

    /// Stage pixels per millimetre as seen by this camera
    pub const fn mm_to_pixel(self) -> f32 {
        match self {
            CameraModel::Basler => 17736.0,
            CameraModel::Thorlabs => 16140.0,
        }
    }

    /// SLM device units to camera pixels
    pub const fn slm_to_pixel(self) -> f32 {
        match self {
            CameraModel::Basler => 5_000_000.0,
            CameraModel::Thorlabs => 4_550_000.0,
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CameraConfig {
    pub model: CameraModel,
    /// Border kept around the traps when zooming in (px)
    pub zoom_margin_px: f32,
    /// Frame period (ms)
    pub frame_interval_ms: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            model: CameraModel::Basler,
            zoom_margin_px: 60.0,
            frame_interval_ms: 50,
        }
    }
}

/// Stage axis scaling and orientation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StageAxes {
    /// Override for pixels per mm; camera default when None
    pub mm_to_pixel: Option<f32>,
    /// Stage x runs opposite to image x
    pub invert_x: bool,
    /// Stage y runs opposite to image y
    pub invert_y: bool,
    /// Lowest allowed z position (ticks)
    pub z_min_ticks: i32,
    /// Highest allowed z position (ticks)
    pub z_max_ticks: i32,
}

impl Default for StageAxes {
    fn default() -> Self {
        Self {
            mm_to_pixel: None,
            invert_x: false,
            invert_y: false,
            z_min_ticks: -10_000,
            z_max_ticks: 10_000,
        }
    }
}

impl StageAxes {
    /// Convert a pixel-space move into stage millimetres
    pub fn pixels_to_mm(&self, camera: CameraModel, dx: f32, dy: f32) -> (f32, f32) {
        let scale = self.mm_to_pixel.unwrap_or(camera.mm_to_pixel());
        let sx = if self.invert_x { -1.0 } else { 1.0 };
        let sy = if self.invert_y { -1.0 } else { 1.0 };
        (sx * dx / scale, sy * dy / scale)
    }

    /// Clamp a z target into the allowed travel
    pub fn clamp_z(&self, z: i32) -> i32 {
        z.clamp(self.z_min_ticks, self.z_max_ticks)
    }
}

/// Linear focus drift coefficients
///
/// Moving the stage or warming the sample shifts the focal plane; these
/// describe the z correction in ticks per mm and ticks per °C.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FocusConfig {
    pub z_x_diff: f32,
    pub z_y_diff: f32,
    pub temperature_z_diff: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults() {
        assert_eq!(CameraModel::Basler.sensor(), Aoi::full(672, 512));
        assert_eq!(CameraModel::Thorlabs.aoi_granularity(), 20);
    }

    #[test]
    fn test_pixels_to_mm_with_inversion() {
        let axes = StageAxes {
            mm_to_pixel: Some(1000.0),
            invert_y: true,
            ..StageAxes::default()
        };
        assert_eq!(axes.pixels_to_mm(CameraModel::Basler, 500.0, 250.0), (0.5, -0.25));
    }

    #[test]
    fn test_clamp_z() {
        let axes = StageAxes::default();
        assert_eq!(axes.clamp_z(20_000), 10_000);
        assert_eq!(axes.clamp_z(-5), -5);
    }
}
