//! Simulated stage

use tweezer_core::geometry::Displacement;
use tweezer_core::traits::{StageDriver, StageError, StagePosition};

use crate::sample::SharedSample;

/// Stage carrying the shared sample
///
/// x/y moves shift the sample on the sensor by `mm_to_pixel` pixels per
/// millimetre. Without an encoder `position` reports no z.
pub struct SimStage {
    sample: SharedSample,
    mm_to_pixel: f32,
    x_mm: f32,
    y_mm: f32,
    z_ticks: i32,
    z_range: (i32, i32),
    has_encoder: bool,
    connected: bool,
}

impl SimStage {
    pub fn new(sample: SharedSample, mm_to_pixel: f32) -> Self {
        let z_ticks = sample.lock(|s| s.borrow().z());
        Self {
            sample,
            mm_to_pixel,
            x_mm: 0.0,
            y_mm: 0.0,
            z_ticks,
            z_range: (-10_000, 10_000),
            has_encoder: true,
            connected: true,
        }
    }

    pub fn with_encoder(mut self, has_encoder: bool) -> Self {
        self.has_encoder = has_encoder;
        self
    }

    pub fn with_z_range(mut self, min: i32, max: i32) -> Self {
        self.z_range = (min, max);
        self
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn check(&self) -> Result<(), StageError> {
        if self.connected {
            Ok(())
        } else {
            Err(StageError::NotConnected)
        }
    }
}

impl StageDriver for SimStage {
    fn move_xy(&mut self, dx_mm: f32, dy_mm: f32) -> Result<(), StageError> {
        self.check()?;
        self.x_mm += dx_mm;
        self.y_mm += dy_mm;
        let shift = Displacement::new(dx_mm * self.mm_to_pixel, dy_mm * self.mm_to_pixel);
        self.sample.lock(|s| s.borrow_mut().shift(shift));
        Ok(())
    }

    fn move_z_by(&mut self, ticks: i32) -> Result<(), StageError> {
        self.move_z_to(self.z_ticks.saturating_add(ticks))
    }

    fn move_z_to(&mut self, ticks: i32) -> Result<(), StageError> {
        self.check()?;
        if ticks < self.z_range.0 || ticks > self.z_range.1 {
            return Err(StageError::OutOfRange);
        }
        self.z_ticks = ticks;
        self.sample.lock(|s| s.borrow_mut().set_z(ticks));
        Ok(())
    }

    fn position(&self) -> Result<StagePosition, StageError> {
        self.check()?;
        Ok(StagePosition {
            x_mm: self.x_mm,
            y_mm: self.y_mm,
            z_ticks: self.has_encoder.then_some(self.z_ticks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{shared, SampleConfig, SampleModel};
    use tweezer_core::geometry::Point;

    fn stage() -> (SimStage, SharedSample) {
        let sample = shared(SampleModel::with_particles(
            SampleConfig::default(),
            &[Point::new(100.0, 100.0)],
        ));
        (SimStage::new(sample.clone(), 1000.0), sample)
    }

    #[test]
    fn test_xy_move_shifts_sample() {
        let (mut stage, sample) = stage();
        stage.move_xy(0.01, -0.02).unwrap();
        let pos = stage.position().unwrap();
        assert!((pos.x_mm - 0.01).abs() < 1e-6);
        let visible = sample.lock(|s| s.borrow().visible_particles());
        assert!((visible[0].x - 110.0).abs() < 1e-3);
        assert!((visible[0].y - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_z_range() {
        let (stage, _) = stage();
        let mut stage = stage.with_z_range(-100, 100);
        stage.move_z_by(80).unwrap();
        assert_eq!(stage.move_z_by(40), Err(StageError::OutOfRange));
        assert_eq!(stage.position().unwrap().z_ticks, Some(80));
    }

    #[test]
    fn test_no_encoder() {
        let (stage, sample) = stage();
        let mut stage = stage.with_encoder(false);
        stage.move_z_to(300).unwrap();
        assert_eq!(stage.position().unwrap().z_ticks, None);
        assert_eq!(sample.lock(|s| s.borrow().z()), 300);
    }

    #[test]
    fn test_disconnected() {
        let (mut stage, _) = stage();
        stage.set_connected(false);
        assert_eq!(stage.move_xy(1.0, 0.0), Err(StageError::NotConnected));
        assert_eq!(stage.position(), Err(StageError::NotConnected));
    }
}
