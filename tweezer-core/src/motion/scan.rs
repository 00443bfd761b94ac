//! Boustrophedon search scan
//!
//! When too few particles are visible the stage sweeps the sample in a
//! serpentine: up through a band, a small step sideways, back down, a
//! step sideways, and so on.

use crate::config::{ScanConfig, ScanDirection};
use crate::geometry::Displacement;

/// Serpentine scan state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPattern {
    config: ScanConfig,
    direction: ScanDirection,
    /// Stage x where the current sideways step began (mm)
    x_start_mm: f32,
}

impl Default for ScanPattern {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl ScanPattern {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            direction: config.initial_direction,
            x_start_mm: 0.0,
        }
    }

    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    /// Next scan move, then update the direction for the following one
    ///
    /// `current` and `start` are stage `(x, y)` positions in mm; `start`
    /// is where the program began and anchors the scanned band.
    pub fn step(&mut self, current: (f32, f32), start: (f32, f32)) -> Displacement {
        let step = self.config.step_px;
        let movement = match self.direction {
            ScanDirection::Right => Displacement::new(step, 0.0),
            ScanDirection::Left => Displacement::new(-step, 0.0),
            ScanDirection::Up => Displacement::new(0.0, step),
            ScanDirection::Down => Displacement::new(0.0, -step),
        };

        let (x, y) = current;
        let dy = y - start.1;

        if self.direction == ScanDirection::Up && dy > self.config.y_span_mm {
            self.direction = ScanDirection::Right;
            self.x_start_mm = x;
        }

        if self.direction == ScanDirection::Right && x - self.x_start_mm > self.config.x_step_mm {
            self.direction = if dy > self.config.y_span_mm / 2.0 {
                ScanDirection::Down
            } else {
                ScanDirection::Up
            };
        }

        if self.direction == ScanDirection::Down && dy < 0.0 {
            self.direction = ScanDirection::Right;
            self.x_start_mm = x;
        }

        movement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MM_TO_PIXEL: f32 = 17736.0;

    fn apply(pos: &mut (f32, f32), d: Displacement) {
        pos.0 += d.dx / MM_TO_PIXEL;
        pos.1 += d.dy / MM_TO_PIXEL;
    }

    #[test]
    fn test_first_move_is_up() {
        let mut scan = ScanPattern::default();
        let d = scan.step((0.0, 0.0), (0.0, 0.0));
        assert_eq!(d, Displacement::new(0.0, 300.0));
        assert_eq!(scan.direction(), ScanDirection::Up);
    }

    #[test]
    fn test_serpentine_cycle() {
        let mut scan = ScanPattern::default();
        let start = (0.0, 0.0);
        let mut pos = start;
        let mut seen = heapless::Vec::<ScanDirection, 16>::new();

        for _ in 0..2000 {
            let before = scan.direction();
            let d = scan.step(pos, start);
            apply(&mut pos, d);
            if scan.direction() != before && seen.push(scan.direction()).is_err() {
                break;
            }
        }

        assert_eq!(
            &seen[..5],
            &[
                ScanDirection::Right,
                ScanDirection::Down,
                ScanDirection::Right,
                ScanDirection::Up,
                ScanDirection::Right,
            ]
        );
        // The scan keeps drifting right, never left
        assert!(pos.0 > 0.0);
        assert!(pos.1 >= -0.1 && pos.1 <= 3.1);
    }

    #[test]
    fn test_down_leg_turns_below_start() {
        let mut scan = ScanPattern::new(ScanConfig {
            initial_direction: ScanDirection::Down,
            ..ScanConfig::default()
        });
        let d = scan.step((1.0, -0.01), (1.0, 0.0));
        assert_eq!(d, Displacement::new(0.0, -300.0));
        assert_eq!(scan.direction(), ScanDirection::Right);
    }
}
