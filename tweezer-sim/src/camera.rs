//! Simulated camera
//!
//! Renders every visible particle as a bright disc on a dark background
//! over the current AOI.

use std::time::Instant;

use tweezer_core::geometry::{Aoi, Point};
use tweezer_core::traits::{Camera, CameraError, Frame};

use crate::sample::SharedSample;

/// Background gray level
const BACKGROUND: u8 = 20;
/// Particle gray level
const PARTICLE: u8 = 220;

/// Camera looking at the shared sample
pub struct SimCamera {
    sample: SharedSample,
    sensor: Aoi,
    aoi: Aoi,
    particle_radius_px: f32,
    started: Instant,
    connected: bool,
}

impl SimCamera {
    /// Create a camera with the full sensor as AOI
    pub fn new(sample: SharedSample, sensor: Aoi) -> Self {
        Self {
            sample,
            sensor,
            aoi: sensor,
            particle_radius_px: 10.0,
            started: Instant::now(),
            connected: true,
        }
    }

    /// Simulate unplugging the camera
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn render(&self, particles: &[Point]) -> Vec<u8> {
        let aoi = self.aoi;
        let (w, h) = (aoi.width() as usize, aoi.height() as usize);
        let mut pixels = vec![BACKGROUND; w * h];
        let r = self.particle_radius_px;
        let r_sq = r * r;

        for p in particles {
            let rel = aoi.to_relative(*p);
            let x0 = (rel.x - r).floor().max(0.0) as usize;
            let y0 = (rel.y - r).floor().max(0.0) as usize;
            let x1 = ((rel.x + r).ceil().max(0.0) as usize).min(w);
            let y1 = ((rel.y + r).ceil().max(0.0) as usize).min(h);
            for y in y0..y1 {
                for x in x0..x1 {
                    let dx = x as f32 + 0.5 - rel.x;
                    let dy = y as f32 + 0.5 - rel.y;
                    if dx * dx + dy * dy <= r_sq {
                        pixels[y * w + x] = PARTICLE;
                    }
                }
            }
        }
        pixels
    }
}

impl Camera for SimCamera {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        if !self.connected {
            return Err(CameraError::NotConnected);
        }
        let particles = self.sample.lock(|s| {
            let mut s = s.borrow_mut();
            s.advance();
            s.visible_particles()
        });
        Ok(Frame {
            aoi: self.aoi,
            pixels: self.render(&particles),
            timestamp_ms: self.started.elapsed().as_millis() as u64,
        })
    }

    fn set_aoi(&mut self, aoi: Aoi) -> Result<(), CameraError> {
        if !self.connected {
            return Err(CameraError::NotConnected);
        }
        let inside = aoi.left >= self.sensor.left
            && aoi.right <= self.sensor.right
            && aoi.up >= self.sensor.up
            && aoi.down <= self.sensor.down;
        if !inside || aoi.width() == 0 || aoi.height() == 0 {
            return Err(CameraError::InvalidAoi);
        }
        self.aoi = aoi;
        Ok(())
    }

    fn aoi(&self) -> Aoi {
        self.aoi
    }
}
