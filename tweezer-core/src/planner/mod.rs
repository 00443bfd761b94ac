//! Collision-avoiding stage move planning
//!
//! When some traps already hold particles, dragging the sample straight
//! toward an empty trap can sweep a held particle out or pull a free one
//! through an occupied trap. The planner discretizes the field of view
//! into a grid, fences off the cells around occupied traps and runs a
//! shortest-path search, returning only the first short hop. The caller
//! re-plans every cycle as occupancy changes.

pub mod grid;
pub mod path;
pub mod search;

pub use grid::{Cell, Grid, GUARD_WEIGHT, OPEN_WEIGHT, TRAP_CELL_WEIGHT};
pub use path::{PathPlanner, PlanError, PlannedMove};
pub use search::{shortest_path, SearchOutcome};
