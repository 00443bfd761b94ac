//! Threshold particle detector
//!
//! Thresholds the frame, labels 4-connected regions and reports the
//! centre of mass of every region whose pixel count lies strictly
//! between the lower and upper size thresholds.

use tweezer_core::config::DetectionConfig;
use tweezer_core::geometry::Point;
use tweezer_core::traits::{Detector, Frame};

/// Connected-component detector
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdDetector;

impl ThresholdDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for ThresholdDetector {
    fn detect(&self, frame: &Frame, config: &DetectionConfig) -> Vec<Point> {
        let (w, h) = (frame.width(), frame.height());
        if frame.pixels.len() < w * h {
            return Vec::new();
        }

        let mask: Vec<bool> = frame
            .pixels
            .iter()
            .map(|&v| {
                if config.bright_particle {
                    v > config.threshold
                } else {
                    v < config.threshold
                }
            })
            .collect();

        let mut seen = vec![false; w * h];
        let mut stack = Vec::new();
        let mut centres = Vec::new();

        for start in 0..w * h {
            if !mask[start] || seen[start] {
                continue;
            }
            seen[start] = true;
            stack.push(start);

            let (mut count, mut sum_x, mut sum_y) = (0u32, 0f64, 0f64);
            while let Some(idx) = stack.pop() {
                let (x, y) = (idx % w, idx / w);
                count += 1;
                sum_x += x as f64;
                sum_y += y as f64;

                let mut visit = |n: usize| {
                    if mask[n] && !seen[n] {
                        seen[n] = true;
                        stack.push(n);
                    }
                };
                if x > 0 {
                    visit(idx - 1);
                }
                if x + 1 < w {
                    visit(idx + 1);
                }
                if y > 0 {
                    visit(idx - w);
                }
                if y + 1 < h {
                    visit(idx + w);
                }
            }

            if count > config.size_threshold && count < config.upper_size_threshold {
                let n = count as f64;
                centres.push(Point::new((sum_x / n) as f32, (sum_y / n) as f32));
            }
        }
        centres
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SimCamera;
    use crate::sample::{shared, SampleConfig, SampleModel};
    use proptest::prelude::*;
    use tweezer_core::geometry::Aoi;
    use tweezer_core::traits::Camera;

    fn frame_with_squares(w: u32, h: u32, squares: &[(usize, usize, usize)]) -> Frame {
        let mut pixels = vec![10u8; (w * h) as usize];
        for &(x0, y0, side) in squares {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    pixels[y * w as usize + x] = 200;
                }
            }
        }
        Frame {
            aoi: Aoi::full(w, h),
            pixels,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_finds_centres() {
        let frame = frame_with_squares(200, 100, &[(10, 10, 20), (100, 50, 20)]);
        let found = ThresholdDetector.detect(&frame, &DetectionConfig::default());
        assert_eq!(found, vec![Point::new(19.5, 19.5), Point::new(109.5, 59.5)]);
    }

    #[test]
    fn test_size_window_is_exclusive() {
        let config = DetectionConfig {
            size_threshold: 100,
            upper_size_threshold: 400,
            ..DetectionConfig::default()
        };
        // 100 px, 225 px, 400 px
        let frame = frame_with_squares(200, 100, &[(0, 0, 10), (50, 0, 15), (100, 0, 20)]);
        let found = ThresholdDetector.detect(&frame, &config);
        assert_eq!(found, vec![Point::new(57.0, 7.0)]);
    }

    #[test]
    fn test_dark_particles() {
        let mut frame = frame_with_squares(100, 100, &[]);
        for v in frame.pixels.iter_mut() {
            *v = 200;
        }
        for y in 40..60 {
            for x in 40..60 {
                frame.pixels[y * 100 + x] = 5;
            }
        }
        let config = DetectionConfig {
            bright_particle: false,
            ..DetectionConfig::default()
        };
        let found = ThresholdDetector.detect(&frame, &config);
        assert_eq!(found, vec![Point::new(49.5, 49.5)]);
    }

    #[test]
    fn test_touching_diagonals_are_separate() {
        let mut frame = frame_with_squares(100, 100, &[(0, 0, 15)]);
        for y in 15..30 {
            for x in 15..30 {
                frame.pixels[y * 100 + x] = 200;
            }
        }
        let found = ThresholdDetector.detect(&frame, &DetectionConfig::default());
        assert_eq!(found.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_rendered_particles_are_found(
            cells in proptest::collection::btree_set((1u32..15, 1u32..11), 0..12)
        ) {
            // One particle per 40 px cell keeps discs apart
            let particles: Vec<Point> = cells
                .iter()
                .map(|&(cx, cy)| Point::new(cx as f32 * 40.0 + 20.0, cy as f32 * 40.0 + 20.0))
                .collect();
            let sample = shared(SampleModel::with_particles(SampleConfig::default(), &particles));
            let mut cam = SimCamera::new(sample, Aoi::full(672, 512));
            let frame = cam.capture().unwrap();

            let found = ThresholdDetector.detect(&frame, &DetectionConfig::default());
            prop_assert_eq!(found.len(), particles.len());
            for p in &found {
                prop_assert!(particles.iter().any(|q| q.distance_sq(*p) < 4.0));
            }
        }
    }
}
