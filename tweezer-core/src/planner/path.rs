//! Single-hop move planning around occupied traps

use crate::config::PlannerConfig;
use crate::geometry::{Aoi, Displacement, Point};

use super::grid::{Cell, Grid};
use super::search::{shortest_path, SearchOutcome};

/// Reasons the planner could not produce a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlanError {
    /// AOI is smaller than a single cell
    EmptyGrid,
    /// Particle or trap lies outside the planning grid
    OutOfGrid,
    /// Occupied traps cut every route to the target cell
    Unreachable { iterations: usize },
    /// Particle is already in the target cell
    AlreadyInCell,
}

/// A planned stage hop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedMove {
    /// Move that carries the particle onto the waypoint cell centre
    pub displacement: Displacement,
    /// Cell the particle should land in
    pub waypoint: Cell,
    /// Nodes settled by the search
    pub iterations: usize,
}

/// Grid planner for guarded stage moves
#[derive(Debug, Clone, Copy)]
pub struct PathPlanner {
    cell_width: u32,
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self::from_config(&PlannerConfig::default())
    }
}

impl PathPlanner {
    pub const fn new(cell_width: u32) -> Self {
        Self { cell_width }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.cell_width)
    }

    /// Grid over the AOI with every occupied trap fenced off
    ///
    /// Positions are AOI-relative pixels.
    pub fn build_grid(&self, occupied_traps: &[Point], aoi: &Aoi) -> Grid {
        let mut grid = Grid::new(aoi.width(), aoi.height(), self.cell_width);
        for &trap in occupied_traps {
            grid.guard(trap);
        }
        grid
    }

    /// Run the raw search from the particle's cell to the trap's cell
    pub fn search(
        &self,
        occupied_traps: &[Point],
        particle: Point,
        trap: Point,
        aoi: &Aoi,
    ) -> Result<(Grid, SearchOutcome), PlanError> {
        let grid = self.build_grid(occupied_traps, aoi);
        if grid.node_count() == 0 {
            return Err(PlanError::EmptyGrid);
        }
        let source = grid.cell_of(particle).ok_or(PlanError::OutOfGrid)?;
        let target = grid.cell_of(trap).ok_or(PlanError::OutOfGrid)?;
        let outcome = shortest_path(&grid, grid.index(source), grid.index(target));
        Ok((grid, outcome))
    }

    /// Plan the next hop that brings `particle` toward `trap`
    ///
    /// The waypoint is two hops along the path when the path has at least
    /// four cells, otherwise the next cell.
    pub fn plan_move(
        &self,
        occupied_traps: &[Point],
        particle: Point,
        trap: Point,
        aoi: &Aoi,
    ) -> Result<PlannedMove, PlanError> {
        let (grid, outcome) = self.search(occupied_traps, particle, trap, aoi)?;
        let iterations = outcome.iterations;
        let path = outcome.path.ok_or(PlanError::Unreachable { iterations })?;

        let hop = match path.len() {
            0 | 1 => return Err(PlanError::AlreadyInCell),
            2 | 3 => path[1],
            _ => path[2],
        };
        let waypoint = grid.cell(hop);

        Ok(PlannedMove {
            displacement: particle.towards(grid.center(waypoint)),
            waypoint,
            iterations,
        })
    }
}
