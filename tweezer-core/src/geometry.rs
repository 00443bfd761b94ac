//! Pixel and device-space geometry
//!
//! Vision and planning work in camera pixels, relative to the active
//! region of interest (AOI). The hologram service works in SLM device
//! coordinates. `SlmCalibration` converts between the two.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point
    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    /// Displacement that carries `self` onto `target`
    pub fn towards(self, target: Point) -> Displacement {
        Displacement::new(target.x - self.x, target.y - self.y)
    }

    pub fn offset(self, d: Displacement) -> Point {
        Point::new(self.x + d.dx, self.y + d.dy)
    }
}

/// A relative stage move in pixel-equivalent units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Displacement {
    pub dx: f32,
    pub dy: f32,
}

impl Displacement {
    pub const ZERO: Displacement = Displacement { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }

    /// Limit each axis independently to `[-limit, limit]`
    pub fn clamp_axes(self, limit: f32) -> Self {
        Self {
            dx: self.dx.clamp(-limit, limit),
            dy: self.dy.clamp(-limit, limit),
        }
    }
}

/// Camera region of interest in absolute sensor pixels
///
/// `left..right` horizontally and `up..down` vertically, matching how
/// camera drivers describe readout windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aoi {
    pub left: u32,
    pub right: u32,
    pub up: u32,
    pub down: u32,
}

impl Aoi {
    pub const fn new(left: u32, right: u32, up: u32, down: u32) -> Self {
        Self { left, right, up, down }
    }

    /// Full sensor readout
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, width, 0, height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.down.saturating_sub(self.up)
    }

    /// Convert an AOI-relative position to absolute sensor pixels
    pub fn to_absolute(&self, p: Point) -> Point {
        Point::new(p.x + self.left as f32, p.y + self.up as f32)
    }

    /// Convert an absolute sensor position to AOI-relative pixels
    pub fn to_relative(&self, p: Point) -> Point {
        Point::new(p.x - self.left as f32, p.y - self.up as f32)
    }
}

/// Image axis selector for coordinate conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
}

/// Smallest value at which a coordinate list counts as pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelBound {
    /// Trap lists: the minimum must exceed 1
    AboveOne,
    /// Ghost trap lists: a minimum of exactly 1 is already pixels
    FromOne,
}

impl PixelBound {
    fn is_pixels(self, min: f32) -> bool {
        match self {
            PixelBound::AboveOne => min > 1.0,
            PixelBound::FromOne => min >= 1.0,
        }
    }
}

/// SLM device ↔ camera pixel calibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SlmCalibration {
    /// Pixel x of the SLM optical axis
    pub x_center: f32,
    /// Pixel y of the SLM optical axis
    pub y_center: f32,
    /// Pixels per device unit
    pub slm_to_pixel: f32,
}

impl Default for SlmCalibration {
    fn default() -> Self {
        Self {
            x_center: 558.0,
            y_center: 576.0,
            slm_to_pixel: 5_000_000.0,
        }
    }
}

impl SlmCalibration {
    /// Absolute pixel position of a trap at device coordinates `(xm, ym)`
    pub fn device_to_pixel(&self, xm: f32, ym: f32) -> Point {
        Point::new(
            xm * self.slm_to_pixel + self.x_center,
            ym * self.slm_to_pixel + self.y_center,
        )
    }

    /// Device coordinate of an absolute pixel value along one axis
    pub fn pixel_to_device(&self, axis: Axis, value: f32) -> f32 {
        let offset = match axis {
            Axis::X => self.x_center,
            Axis::Y => self.y_center,
        };
        (value - offset) / self.slm_to_pixel
    }

    /// Normalize a coordinate list to device units
    ///
    /// Device coordinates are tiny (order 1e-5), so a list whose smallest
    /// value reaches `bound` is taken to be in pixels and converted.
    /// Returns true if a conversion happened.
    pub fn normalize(&self, axis: Axis, values: &mut [f32], bound: PixelBound) -> bool {
        let Some(min) = values.iter().copied().reduce(f32::min) else {
            return false;
        };
        if !bound.is_pixels(min) {
            return false;
        }
        for v in values.iter_mut() {
            *v = self.pixel_to_device(axis, *v);
        }
        true
    }
}

/// Compute the camera window to zoom in on around a set of traps
///
/// `points` are absolute sensor pixels. Edges are widened by `margin`,
/// clamped to the sensor and snapped down to the camera's AOI
/// `granularity`. Returns None when there is nothing to frame.
pub fn zoom_region(points: &[Point], margin: f32, granularity: u32, sensor: Aoi) -> Option<Aoi> {
    let first = points.first()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let g = granularity.max(1);
    let snap = |v: f32| (v as u32) / g * g;

    let left = snap((min_x - margin).max(sensor.left as f32));
    let right = snap((max_x + margin).min(sensor.right as f32));
    let up = snap((min_y - margin).max(sensor.up as f32));
    let down = snap((max_y + margin).min(sensor.down as f32));

    if right <= left || down <= up {
        return None;
    }
    Some(Aoi::new(left, right, up, down))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_pixel_roundtrip() {
        let cal = SlmCalibration::default();
        let p = cal.device_to_pixel(-2.0e-5, 1.0e-5);
        assert!((p.x - 458.0).abs() < 0.01);
        assert!((p.y - 626.0).abs() < 0.01);
        assert!((cal.pixel_to_device(Axis::X, p.x) + 2.0e-5).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_pixels_only_when_large() {
        let cal = SlmCalibration::default();
        let mut device = [1.0e-5, -1.0e-5];
        assert!(!cal.normalize(Axis::X, &mut device, PixelBound::AboveOne));
        assert_eq!(device, [1.0e-5, -1.0e-5]);

        let mut pixels = [558.0, 608.0];
        assert!(cal.normalize(Axis::X, &mut pixels, PixelBound::AboveOne));
        assert_eq!(pixels[0], 0.0);
        assert!((pixels[1] - 1.0e-5).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_bound_at_one() {
        let cal = SlmCalibration::default();
        let mut traps = [1.0, 200.0];
        assert!(!cal.normalize(Axis::X, &mut traps, PixelBound::AboveOne));
        assert_eq!(traps, [1.0, 200.0]);

        let mut ghosts = [1.0, 200.0];
        assert!(cal.normalize(Axis::X, &mut ghosts, PixelBound::FromOne));
        assert_eq!(ghosts[0], cal.pixel_to_device(Axis::X, 1.0));
    }

    #[test]
    fn test_clamp_axes() {
        let d = Displacement::new(500.0, -20.0).clamp_axes(40.0);
        assert_eq!(d, Displacement::new(40.0, -20.0));
    }

    #[test]
    fn test_zoom_region_snaps_and_clamps() {
        let sensor = Aoi::full(672, 512);
        let traps = [Point::new(300.0, 250.0), Point::new(350.0, 270.0)];
        let aoi = zoom_region(&traps, 60.0, 16, sensor).unwrap();
        assert_eq!(aoi, Aoi::new(240, 400, 176, 320));

        let edge = [Point::new(10.0, 500.0)];
        let aoi = zoom_region(&edge, 60.0, 16, sensor).unwrap();
        assert_eq!(aoi.left, 0);
        assert_eq!(aoi.down, 512);
    }

    #[test]
    fn test_zoom_region_empty() {
        assert!(zoom_region(&[], 60.0, 16, Aoi::full(672, 512)).is_none());
    }

    #[test]
    fn test_aoi_relative() {
        let aoi = Aoi::new(240, 400, 176, 320);
        let rel = aoi.to_relative(Point::new(300.0, 250.0));
        assert_eq!(rel, Point::new(60.0, 74.0));
        assert_eq!(aoi.to_absolute(rel), Point::new(300.0, 250.0));
    }
}
