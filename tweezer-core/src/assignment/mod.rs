//! Particle to trap assignment
//!
//! Decides which traps currently hold a particle and which free particle
//! should be brought to which empty trap next. Everything here is
//! recomputed from the latest detections on every decision cycle.

pub mod matrix;
pub mod occupancy;

pub use matrix::DistanceMatrix;
pub use occupancy::{
    compute_occupancy, find_closest_unoccupied, Assignment, Candidate, Occupancy,
    DEFAULT_MATCH_CUTOFF_PX,
};
