//! In-memory sample under the microscope
//!
//! Particles live in sample coordinates (pixels at the starting stage
//! position). A stage move shifts every free particle on the sensor;
//! trapped particles stay on their trap. Lifting the objective past the
//! depth of field hides the free particles on the surface.

use std::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use tweezer_core::geometry::{Aoi, Displacement, Point};

/// Sample shared between the simulated collaborators
pub type SharedSample = Arc<Mutex<CriticalSectionRawMutex, RefCell<SampleModel>>>;

/// Wrap a model for sharing
pub fn shared(model: SampleModel) -> SharedSample {
    Arc::new(Mutex::new(RefCell::new(model)))
}

/// Sample configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleConfig {
    /// Particles scattered at start
    pub particle_count: usize,
    /// Region particles are scattered over, in sensor pixels
    pub spread: Aoi,
    /// A free particle closer than this to an empty trap is captured
    pub capture_radius_px: f32,
    /// Free particles vanish once z is this far above home
    pub depth_of_field_ticks: i32,
    /// Chance per frame that a trapped particle escapes
    pub escape_probability: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            particle_count: 12,
            spread: Aoi::new(0, 1400, 0, 1000),
            capture_radius_px: 15.0,
            depth_of_field_ticks: 60,
            escape_probability: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Particle {
    /// Position in sample coordinates
    position: Point,
    trap: Option<usize>,
}

/// Particles, trap sites, stage offset and focus
#[derive(Debug, Clone)]
pub struct SampleModel {
    config: SampleConfig,
    rng: ChaCha8Rng,
    particles: Vec<Particle>,
    /// Sensor position minus sample position
    offset: Displacement,
    /// Trap sites in sensor pixels
    traps: Vec<Point>,
    z: i32,
}

impl SampleModel {
    /// Scatter particles with a seeded generator
    pub fn new(config: SampleConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let spread = config.spread;
        let particles = (0..config.particle_count)
            .map(|_| Particle {
                position: Point::new(
                    rng.random_range(spread.left as f32..spread.right.max(spread.left + 1) as f32),
                    rng.random_range(spread.up as f32..spread.down.max(spread.up + 1) as f32),
                ),
                trap: None,
            })
            .collect();

        Self {
            config,
            rng,
            particles,
            offset: Displacement::ZERO,
            traps: Vec::new(),
            z: 0,
        }
    }

    /// Model with particles at fixed sensor positions
    pub fn with_particles(config: SampleConfig, positions: &[Point]) -> Self {
        let mut model = Self::new(
            SampleConfig {
                particle_count: 0,
                ..config
            },
            0,
        );
        model.particles = positions
            .iter()
            .map(|&position| Particle { position, trap: None })
            .collect();
        model
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    /// Free particles on the surface are in focus
    pub fn surface_in_focus(&self) -> bool {
        self.z < self.config.depth_of_field_ticks
    }

    fn sensor_position(&self, particle: &Particle) -> Point {
        match particle.trap.and_then(|t| self.traps.get(t)) {
            Some(&trap) => trap,
            None => particle.position.offset(self.offset),
        }
    }

    /// Move the sample under the objective by a sensor-pixel displacement
    pub fn shift(&mut self, d: Displacement) {
        self.offset = Displacement::new(self.offset.dx + d.dx, self.offset.dy + d.dy);
        for p in self.particles.iter_mut().filter(|p| p.trap.is_some()) {
            // Held by the trap: the sample slides underneath
            p.position = p.position.offset(Displacement::new(-d.dx, -d.dy));
        }
        self.capture();
    }

    /// Move the objective to `z` ticks
    pub fn set_z(&mut self, z: i32) {
        self.z = z;
        self.capture();
    }

    /// Replace the trap sites, in sensor pixels
    ///
    /// Particles follow their trap to its new site; traps beyond the new
    /// list release theirs.
    pub fn set_traps(&mut self, traps: Vec<Point>) {
        self.traps = traps;
        let offset = self.offset;
        for p in self.particles.iter_mut() {
            match p.trap.and_then(|t| self.traps.get(t)) {
                Some(&site) => p.position = site.offset(Displacement::new(-offset.dx, -offset.dy)),
                None => p.trap = None,
            }
        }
        self.capture();
    }

    pub fn traps(&self) -> &[Point] {
        &self.traps
    }

    fn capture(&mut self) {
        if !self.surface_in_focus() {
            return;
        }
        let radius_sq = self.config.capture_radius_px * self.config.capture_radius_px;
        for (t, &site) in self.traps.iter().enumerate() {
            if self.particles.iter().any(|p| p.trap == Some(t)) {
                continue;
            }
            let offset = self.offset;
            let nearest = self
                .particles
                .iter_mut()
                .filter(|p| p.trap.is_none())
                .map(|p| (p.position.offset(offset).distance_sq(site), p))
                .filter(|(d, _)| *d < radius_sq)
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, p)) = nearest {
                p.trap = Some(t);
                p.position = site.offset(Displacement::new(-offset.dx, -offset.dy));
            }
        }
    }

    /// Advance one frame: trapped particles may escape
    pub fn advance(&mut self) {
        let chance = self.config.escape_probability;
        if chance <= 0.0 {
            return;
        }
        for p in self.particles.iter_mut() {
            if p.trap.is_some() && self.rng.random_bool(chance.min(1.0)) {
                p.trap = None;
            }
        }
    }

    /// Sensor positions of every particle the camera can see
    pub fn visible_particles(&self) -> Vec<Point> {
        let surface = self.surface_in_focus();
        self.particles
            .iter()
            .filter(|p| surface || p.trap.is_some())
            .map(|p| self.sensor_position(p))
            .collect()
    }

    pub fn trapped_count(&self) -> usize {
        self.particles.iter().filter(|p| p.trap.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(positions: &[(f32, f32)]) -> SampleModel {
        let points: Vec<Point> = positions.iter().map(|&(x, y)| Point::new(x, y)).collect();
        SampleModel::with_particles(SampleConfig::default(), &points)
    }

    #[test]
    fn test_seeded_scatter_is_reproducible() {
        let a = SampleModel::new(SampleConfig::default(), 7);
        let b = SampleModel::new(SampleConfig::default(), 7);
        assert_eq!(a.visible_particles(), b.visible_particles());
        assert_eq!(a.visible_particles().len(), 12);
    }

    #[test]
    fn test_trap_captures_nearby_particle() {
        let mut m = model(&[(100.0, 100.0), (300.0, 300.0)]);
        m.set_traps(vec![Point::new(105.0, 100.0)]);
        assert_eq!(m.trapped_count(), 1);
        assert!(m.visible_particles().contains(&Point::new(105.0, 100.0)));
    }

    #[test]
    fn test_stage_move_shifts_free_particles_only() {
        let mut m = model(&[(100.0, 100.0), (300.0, 300.0)]);
        m.set_traps(vec![Point::new(100.0, 100.0)]);
        m.shift(Displacement::new(50.0, -20.0));

        let visible = m.visible_particles();
        assert!(visible.contains(&Point::new(100.0, 100.0)));
        assert!(visible.contains(&Point::new(350.0, 280.0)));
    }

    #[test]
    fn test_moving_particle_onto_trap_captures_it() {
        let mut m = model(&[(200.0, 200.0)]);
        m.set_traps(vec![Point::new(100.0, 100.0)]);
        assert_eq!(m.trapped_count(), 0);
        m.shift(Displacement::new(-95.0, -98.0));
        assert_eq!(m.trapped_count(), 1);
    }

    #[test]
    fn test_lift_hides_free_particles() {
        let mut m = model(&[(100.0, 100.0), (300.0, 300.0)]);
        m.set_traps(vec![Point::new(100.0, 100.0)]);
        m.set_z(200);
        assert!(!m.surface_in_focus());
        assert_eq!(m.visible_particles(), vec![Point::new(100.0, 100.0)]);

        // Lifted traps do not pick up particles from the surface
        m.set_traps(vec![Point::new(100.0, 100.0), Point::new(300.0, 300.0)]);
        assert_eq!(m.trapped_count(), 1);
    }

    #[test]
    fn test_removed_trap_releases_particle() {
        let mut m = model(&[(100.0, 100.0), (200.0, 100.0)]);
        m.set_traps(vec![Point::new(100.0, 100.0), Point::new(200.0, 100.0)]);
        assert_eq!(m.trapped_count(), 2);
        m.set_traps(vec![Point::new(100.0, 100.0)]);
        assert_eq!(m.trapped_count(), 1);
    }

    #[test]
    fn test_certain_escape() {
        let mut m = SampleModel::with_particles(
            SampleConfig {
                escape_probability: 1.0,
                ..SampleConfig::default()
            },
            &[Point::new(100.0, 100.0)],
        );
        m.set_traps(vec![Point::new(100.0, 100.0)]);
        assert_eq!(m.trapped_count(), 1);
        m.advance();
        assert_eq!(m.trapped_count(), 0);
    }
}
