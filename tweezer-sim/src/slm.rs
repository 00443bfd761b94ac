//! Simulated SLM
//!
//! Rendering a phase mask moves the sample's trap sites to the pixel
//! positions of the active traps.

use tweezer_core::experiment::DeviceTrap;
use tweezer_core::geometry::SlmCalibration;
use tweezer_core::traits::{HologramService, HologramSettings, SlmError};

use crate::sample::SharedSample;

pub struct SimSlm {
    sample: SharedSample,
    calibration: SlmCalibration,
    renders: u32,
    last_settings: Option<HologramSettings>,
    connected: bool,
}

impl SimSlm {
    pub fn new(sample: SharedSample, calibration: SlmCalibration) -> Self {
        Self {
            sample,
            calibration,
            renders: 0,
            last_settings: None,
            connected: true,
        }
    }

    /// Phase masks displayed so far
    pub fn renders(&self) -> u32 {
        self.renders
    }

    pub fn last_settings(&self) -> Option<HologramSettings> {
        self.last_settings
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl HologramService for SimSlm {
    fn render(&mut self, traps: &[DeviceTrap], settings: &HologramSettings) -> Result<(), SlmError> {
        if !self.connected {
            return Err(SlmError::NotConnected);
        }
        if settings.iterations == 0 {
            return Err(SlmError::RenderFailed);
        }
        let sites = traps
            .iter()
            .map(|t| self.calibration.device_to_pixel(t.xm, t.ym))
            .collect();
        self.sample.lock(|s| s.borrow_mut().set_traps(sites));
        self.renders += 1;
        self.last_settings = Some(*settings);
        Ok(())
    }
}
