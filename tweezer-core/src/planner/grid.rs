//! Planning grid over the camera AOI

use alloc::vec;
use alloc::vec::Vec;

use crate::geometry::Point;

/// Entry cost of an ordinary cell
pub const OPEN_WEIGHT: u32 = 1;

/// Entry cost of a cell fenced off around an occupied trap
pub const GUARD_WEIGHT: u32 = 50;

/// Entry cost of the cell an occupied trap sits in
pub const TRAP_CELL_WEIGHT: u32 = 40;

/// Squared cell distance below which cells around an occupied trap are fenced
const GUARD_RADIUS_SQ: f32 = 3.0;

/// Squared cell distance up to which two cells are neighbours
const NEIGHBOUR_RADIUS_SQ: i32 = 3;

/// Grid cell coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cell {
    pub col: usize,
    pub row: usize,
}

impl Cell {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }

    /// Sum of absolute column and row differences
    pub fn manhattan(self, other: Cell) -> usize {
        self.col.abs_diff(other.col) + self.row.abs_diff(other.row)
    }
}

/// Weighted grid graph rebuilt for every planning call
#[derive(Debug, Clone)]
pub struct Grid {
    cols: usize,
    rows: usize,
    cell_width: f32,
    weights: Vec<u32>,
    closed: Vec<bool>,
}

impl Grid {
    /// Divide a `width × height` pixel area into square cells
    ///
    /// Partial cells at the right and bottom edges are dropped.
    pub fn new(width: u32, height: u32, cell_width: u32) -> Self {
        let cw = cell_width.max(1);
        let cols = (width / cw) as usize;
        let rows = (height / cw) as usize;
        Self {
            cols,
            rows,
            cell_width: cw as f32,
            weights: vec![OPEN_WEIGHT; cols * rows],
            closed: vec![false; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn node_count(&self) -> usize {
        self.cols * self.rows
    }

    pub fn cell_width(&self) -> f32 {
        self.cell_width
    }

    pub fn index(&self, cell: Cell) -> usize {
        cell.row * self.cols + cell.col
    }

    pub fn cell(&self, index: usize) -> Cell {
        Cell::new(index % self.cols, index / self.cols)
    }

    /// Cell containing an AOI-relative pixel position
    pub fn cell_of(&self, p: Point) -> Option<Cell> {
        if p.x < 0.0 || p.y < 0.0 {
            return None;
        }
        let col = (p.x / self.cell_width) as usize;
        let row = (p.y / self.cell_width) as usize;
        (col < self.cols && row < self.rows).then_some(Cell::new(col, row))
    }

    /// Pixel position of a cell's centre
    pub fn center(&self, cell: Cell) -> Point {
        Point::new(
            (cell.col as f32 + 0.5) * self.cell_width,
            (cell.row as f32 + 0.5) * self.cell_width,
        )
    }

    pub fn weight(&self, index: usize) -> u32 {
        self.weights[index]
    }

    /// A closed cell cannot be entered
    pub fn is_closed(&self, index: usize) -> bool {
        self.closed[index]
    }

    /// Fence off the cells around an occupied trap
    ///
    /// Cells whose squared distance to the trap (in cell units) is below 3
    /// become expensive and closed; the trap's own cell is closed too.
    pub fn guard(&mut self, trap: Point) {
        let fx = trap.x / self.cell_width;
        let fy = trap.y / self.cell_width;

        // Guard radius is under 2 cells
        let col_lo = (fx - 2.0).max(0.0) as usize;
        let row_lo = (fy - 2.0).max(0.0) as usize;
        let col_hi = ((fx + 2.0).max(0.0) as usize).min(self.cols.saturating_sub(1));
        let row_hi = ((fy + 2.0).max(0.0) as usize).min(self.rows.saturating_sub(1));

        if self.node_count() == 0 {
            return;
        }

        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                let dx = col as f32 - fx;
                let dy = row as f32 - fy;
                if dx * dx + dy * dy < GUARD_RADIUS_SQ {
                    let idx = self.index(Cell::new(col, row));
                    self.weights[idx] = GUARD_WEIGHT;
                    self.closed[idx] = true;
                }
            }
        }

        if let Some(own) = self.cell_of(trap) {
            let idx = self.index(own);
            self.weights[idx] = TRAP_CELL_WEIGHT;
            self.closed[idx] = true;
        }
    }

    /// Open cells reachable from `index` in one hop
    pub fn neighbours(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let here = self.cell(index);
        let (col, row) = (here.col as i32, here.row as i32);
        (-1i32..=1)
            .flat_map(move |dr| (-1i32..=1).map(move |dc| (dc, dr)))
            .filter(|&(dc, dr)| (dc, dr) != (0, 0) && dc * dc + dr * dr <= NEIGHBOUR_RADIUS_SQ)
            .filter_map(move |(dc, dr)| {
                let c = col + dc;
                let r = row + dr;
                if c < 0 || r < 0 || c as usize >= self.cols || r as usize >= self.rows {
                    return None;
                }
                let idx = r as usize * self.cols + c as usize;
                (!self.closed[idx]).then_some(idx)
            })
    }
}
