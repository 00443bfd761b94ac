//! Camera and particle detector traits

use alloc::vec::Vec;

use crate::config::DetectionConfig;
use crate::geometry::{Aoi, Point};

/// Errors that can occur while capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CameraError {
    /// Camera not connected
    NotConnected,
    /// No frame arrived in time
    Timeout,
    /// Requested AOI is outside the sensor or misaligned
    InvalidAoi,
}

/// An 8-bit grayscale frame covering the AOI it was captured with
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub aoi: Aoi,
    /// Row-major pixels, `aoi.width() * aoi.height()` long
    pub pixels: Vec<u8>,
    /// Capture time since program start (ms)
    pub timestamp_ms: u64,
}

impl Frame {
    pub fn width(&self) -> usize {
        self.aoi.width() as usize
    }

    pub fn height(&self) -> usize {
        self.aoi.height() as usize
    }

    /// Pixel at AOI-relative `(x, y)`
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.pixels.get(y * self.width() + x).copied()
    }
}

/// Trait for cameras
pub trait Camera {
    /// Capture the next frame
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Change the readout window
    fn set_aoi(&mut self, aoi: Aoi) -> Result<(), CameraError>;

    /// Current readout window
    fn aoi(&self) -> Aoi;
}

/// Trait for particle detectors
///
/// A pure function of the frame: returns AOI-relative particle centres.
pub trait Detector {
    fn detect(&self, frame: &Frame, config: &DetectionConfig) -> Vec<Point>;
}
