//! Trap × particle distance matrix

use alloc::vec::Vec;

use crate::geometry::Point;

/// Squared pixel distances, one row per trap and one column per particle
///
/// Distances are kept squared; callers compare against squared thresholds,
/// which orders pairs exactly as true distances would.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    traps: usize,
    particles: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    /// Build the matrix for the current frame
    pub fn new(traps: &[Point], particles: &[Point]) -> Self {
        let mut data = Vec::with_capacity(traps.len() * particles.len());
        for trap in traps {
            for particle in particles {
                data.push(trap.distance_sq(*particle));
            }
        }
        Self {
            traps: traps.len(),
            particles: particles.len(),
            data,
        }
    }

    pub fn trap_count(&self) -> usize {
        self.traps
    }

    pub fn particle_count(&self) -> usize {
        self.particles
    }

    /// Squared distance between a trap and a particle
    pub fn get(&self, trap: usize, particle: usize) -> Option<f32> {
        if trap >= self.traps || particle >= self.particles {
            return None;
        }
        self.data.get(trap * self.particles + particle).copied()
    }

    /// Distances from one trap to every particle
    pub fn row(&self, trap: usize) -> &[f32] {
        if trap >= self.traps {
            return &[];
        }
        let start = trap * self.particles;
        &self.data[start..start + self.particles]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_matches_inputs() {
        let traps = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let particles = [Point::new(3.0, 4.0), Point::new(10.0, 1.0), Point::new(0.0, 0.0)];
        let m = DistanceMatrix::new(&traps, &particles);
        assert_eq!(m.trap_count(), 2);
        assert_eq!(m.particle_count(), 3);
        assert_eq!(m.get(0, 0), Some(25.0));
        assert_eq!(m.get(1, 1), Some(1.0));
        assert_eq!(m.row(1).len(), 3);
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn test_empty_particles() {
        let m = DistanceMatrix::new(&[Point::new(1.0, 1.0)], &[]);
        assert_eq!(m.particle_count(), 0);
        assert!(m.row(0).is_empty());
    }
}
