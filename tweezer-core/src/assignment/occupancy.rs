//! Trap occupancy and closest free pair selection

use alloc::vec;
use alloc::vec::Vec;

use super::matrix::DistanceMatrix;
use crate::geometry::Point;

/// Particles further than this from every empty trap are ignored (px)
pub const DEFAULT_MATCH_CUTOFF_PX: f32 = 2000.0;

/// Occupancy of every trap in the active layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupancy {
    /// One flag per trap; ghost traps are always true
    pub occupied: Vec<bool>,
    /// Particle held by each trap, if any
    pub matched: Vec<Option<usize>>,
    ghost_count: usize,
}

impl Occupancy {
    pub fn trap_count(&self) -> usize {
        self.occupied.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.iter().filter(|&&o| o).count()
    }

    pub fn unoccupied_count(&self) -> usize {
        self.occupied.iter().filter(|&&o| !o).count()
    }

    /// True when every trap holds a particle
    pub fn all_filled(&self) -> bool {
        self.occupied.iter().all(|&o| o)
    }

    /// Number of trailing ghost traps
    pub fn ghost_count(&self) -> usize {
        self.ghost_count
    }

    /// Check whether a particle already sits in some trap
    pub fn is_claimed(&self, particle: usize) -> bool {
        self.matched.iter().any(|m| *m == Some(particle))
    }

    /// Indices of occupied traps that are not ghosts
    pub fn occupied_real(&self) -> impl Iterator<Item = usize> + '_ {
        let real = self.trap_count() - self.ghost_count;
        self.occupied[..real]
            .iter()
            .enumerate()
            .filter(|&(_, &o)| o)
            .map(|(i, _)| i)
    }
}

/// Result of searching for the next particle to capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Candidate {
    /// Bring `particle` to `trap`
    Pair {
        trap: usize,
        particle: usize,
        distance_sq: f32,
    },
    /// `trap` is empty but no free particle is in range
    Unmatched { trap: usize },
    /// Nothing to do: every trap is filled or no particles are visible
    None,
}

/// Classify every trap as occupied or empty
///
/// A trap is occupied when some particle lies within `movement_threshold`
/// pixels, boundary included; the nearest such particle is recorded,
/// first index winning ties. The last `ghost_count` traps are always
/// occupied and never claim a particle.
pub fn compute_occupancy(
    matrix: &DistanceMatrix,
    ghost_count: usize,
    movement_threshold: f32,
) -> Occupancy {
    let traps = matrix.trap_count();
    let ghost_count = ghost_count.min(traps);
    let real = traps - ghost_count;
    let threshold_sq = movement_threshold * movement_threshold;

    let mut occupied = vec![false; traps];
    let mut matched = vec![None; traps];

    for trap in 0..real {
        let mut best: Option<(usize, f32)> = None;
        for (particle, &d) in matrix.row(trap).iter().enumerate() {
            if d <= threshold_sq && best.map_or(true, |(_, b)| d < b) {
                best = Some((particle, d));
            }
        }
        if let Some((particle, _)) = best {
            occupied[trap] = true;
            matched[trap] = Some(particle);
        }
    }

    for flag in occupied.iter_mut().skip(real) {
        *flag = true;
    }

    Occupancy {
        occupied,
        matched,
        ghost_count,
    }
}

/// Pick the globally closest (empty trap, free particle) pair
///
/// Ties resolve to the lowest trap index, then the lowest particle index.
pub fn find_closest_unoccupied(
    matrix: &DistanceMatrix,
    occupancy: &Occupancy,
    cutoff: f32,
) -> Candidate {
    if matrix.particle_count() == 0 {
        return Candidate::None;
    }
    let cutoff_sq = cutoff * cutoff;

    let mut first_empty = None;
    let mut best: Option<(usize, usize, f32)> = None;

    for (trap, _) in occupancy.occupied.iter().enumerate().filter(|&(_, &o)| !o) {
        first_empty.get_or_insert(trap);
        for (particle, &d) in matrix.row(trap).iter().enumerate() {
            if d >= cutoff_sq || occupancy.is_claimed(particle) {
                continue;
            }
            if best.map_or(true, |(_, _, b)| d < b) {
                best = Some((trap, particle, d));
            }
        }
    }

    match (best, first_empty) {
        (Some((trap, particle, distance_sq)), _) => Candidate::Pair {
            trap,
            particle,
            distance_sq,
        },
        (None, Some(trap)) => Candidate::Unmatched { trap },
        (None, None) => Candidate::None,
    }
}

/// Distance matrix and occupancy for one decision cycle
#[derive(Debug, Clone)]
pub struct Assignment {
    pub matrix: DistanceMatrix,
    pub occupancy: Occupancy,
}

impl Assignment {
    pub fn compute(
        traps: &[Point],
        ghost_count: usize,
        particles: &[Point],
        movement_threshold: f32,
    ) -> Self {
        let matrix = DistanceMatrix::new(traps, particles);
        let occupancy = compute_occupancy(&matrix, ghost_count, movement_threshold);
        Self { matrix, occupancy }
    }

    pub fn closest_unoccupied(&self, cutoff: f32) -> Candidate {
        find_closest_unoccupied(&self.matrix, &self.occupancy, cutoff)
    }
}
