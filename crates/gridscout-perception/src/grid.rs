//! Arena occupancy grid.
//!
//! The arena is a fixed `rows × cols` rectangle of [`Cell`]s stored in one
//! flat vector.  Callers address cells with [`GridCoord`] values; anything
//! outside the rectangle simply does not exist and every query treats it as
//! "not there".
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`ArenaGeometry`] | Dimensions plus start and goal centre cells.         |
//! | [`Cell`]          | Explored / obstacle / virtual-wall flags.            |
//! | [`GridMap`]       | The grid itself, with zone and bounds logic.         |
//!
//! Virtual walls are derived: a cell is one iff it lies on the arena border or
//! touches an obstacle (8-neighbourhood).  They mark centres the robot's 3×3
//! footprint cannot occupy and are refreshed whenever an obstacle changes.
//!
//! # Example
//!
//! ```rust
//! use gridscout_perception::grid::{ArenaGeometry, GridMap};
//! use gridscout_types::GridCoord;
//!
//! let mut map = GridMap::new(ArenaGeometry::default());
//! let cell = GridCoord::new(10, 7);
//!
//! map.mark_explored(cell);
//! map.set_obstacle(cell, true);
//!
//! assert!(map.is_obstacle(cell));
//! assert!(map.is_virtual_wall(GridCoord::new(11, 8)));
//! assert!(!map.contains(GridCoord::new(20, 0)));
//! ```

use std::fmt;

use gridscout_types::GridCoord;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// ArenaGeometry
// ────────────────────────────────────────────────────────────────────────────

/// Arena dimensions and the centres of the two 3×3 zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaGeometry {
    pub rows: i32,
    pub cols: i32,
    pub start: GridCoord,
    pub goal: GridCoord,
}

impl ArenaGeometry {
    pub const DEFAULT_ROWS: i32 = 20;
    pub const DEFAULT_COLS: i32 = 15;

    /// Geometry for a `rows × cols` arena with the start zone in the
    /// south-west corner and the goal zone in the north-east corner.
    pub fn with_size(rows: i32, cols: i32) -> Self {
        Self {
            rows,
            cols,
            start: GridCoord::new(1, 1),
            goal: GridCoord::new(rows - 2, cols - 2),
        }
    }

    /// Total number of cells.
    pub fn total_cells(&self) -> usize {
        (self.rows.max(0) * self.cols.max(0)) as usize
    }
}

impl Default for ArenaGeometry {
    fn default() -> Self {
        Self::with_size(Self::DEFAULT_ROWS, Self::DEFAULT_COLS)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cell
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell {
    pub explored: bool,
    pub obstacle: bool,
    /// Derived; see the module docs.
    pub virtual_wall: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// GridMap
// ────────────────────────────────────────────────────────────────────────────

/// A fixed-size occupancy grid.
///
/// The same type holds both the robot's discovered map and, in simulation,
/// the ground-truth arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMap {
    geometry: ArenaGeometry,
    cells: Vec<Cell>,
}

impl GridMap {
    /// Create a fully unexplored, obstacle-free map.  Border cells start as
    /// virtual walls.
    pub fn new(geometry: ArenaGeometry) -> Self {
        let mut map = Self {
            geometry,
            cells: vec![Cell::default(); geometry.total_cells()],
        };
        for coord in map.coords() {
            let wall = map.on_border(coord);
            if let Some(idx) = map.index(coord) {
                map.cells[idx].virtual_wall = wall;
            }
        }
        map
    }

    pub fn geometry(&self) -> ArenaGeometry {
        self.geometry
    }

    pub fn rows(&self) -> i32 {
        self.geometry.rows
    }

    pub fn cols(&self) -> i32 {
        self.geometry.cols
    }

    pub fn start(&self) -> GridCoord {
        self.geometry.start
    }

    pub fn goal(&self) -> GridCoord {
        self.geometry.goal
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    /// `true` iff `coord` lies inside the arena.
    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.row >= 0
            && coord.row < self.geometry.rows
            && coord.col >= 0
            && coord.col < self.geometry.cols
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        self.contains(coord)
            .then(|| (coord.row * self.geometry.cols + coord.col) as usize)
    }

    /// Copy of the cell at `coord`, or `None` outside the arena.
    pub fn cell(&self, coord: GridCoord) -> Option<Cell> {
        self.index(coord).map(|idx| self.cells[idx])
    }

    /// Every coordinate in row-major order starting at row 0.
    pub fn coords(&self) -> impl Iterator<Item = GridCoord> + use<> {
        let (rows, cols) = (self.geometry.rows, self.geometry.cols);
        (0..rows).flat_map(move |row| (0..cols).map(move |col| GridCoord::new(row, col)))
    }

    /// The in-bounds 8-neighbours of `coord` in row-major order.
    pub fn neighbours(&self, coord: GridCoord) -> Vec<GridCoord> {
        let mut out = Vec::with_capacity(8);
        for dr in -1..=1 {
            for dc in -1..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let n = coord.offset(dr, dc);
                if self.contains(n) {
                    out.push(n);
                }
            }
        }
        out
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn is_explored(&self, coord: GridCoord) -> bool {
        self.cell(coord).is_some_and(|c| c.explored)
    }

    pub fn is_obstacle(&self, coord: GridCoord) -> bool {
        self.cell(coord).is_some_and(|c| c.obstacle)
    }

    pub fn is_virtual_wall(&self, coord: GridCoord) -> bool {
        self.cell(coord).is_some_and(|c| c.virtual_wall)
    }

    /// `true` for an obstacle or for any coordinate past the arena edge.
    pub fn is_obstacle_or_wall(&self, coord: GridCoord) -> bool {
        !self.contains(coord) || self.is_obstacle(coord)
    }

    /// In bounds, explored, and not an obstacle.
    pub fn is_explored_free(&self, coord: GridCoord) -> bool {
        self.cell(coord).is_some_and(|c| c.explored && !c.obstacle)
    }

    /// A cell the robot's footprint centre may occupy on the discovered map.
    pub fn is_traversable_center(&self, coord: GridCoord) -> bool {
        self.cell(coord)
            .is_some_and(|c| c.explored && !c.obstacle && !c.virtual_wall)
    }

    fn in_zone(center: GridCoord, coord: GridCoord) -> bool {
        coord.row.abs_diff(center.row) <= 1 && coord.col.abs_diff(center.col) <= 1
    }

    pub fn in_start_zone(&self, coord: GridCoord) -> bool {
        Self::in_zone(self.geometry.start, coord)
    }

    pub fn in_goal_zone(&self, coord: GridCoord) -> bool {
        Self::in_zone(self.geometry.goal, coord)
    }

    fn on_border(&self, coord: GridCoord) -> bool {
        coord.row == 0
            || coord.col == 0
            || coord.row == self.geometry.rows - 1
            || coord.col == self.geometry.cols - 1
    }

    /// Number of explored cells.
    pub fn explored_count(&self) -> usize {
        self.cells.iter().filter(|c| c.explored).count()
    }

    /// `true` once every cell is explored.
    pub fn is_saturated(&self) -> bool {
        self.cells.iter().all(|c| c.explored)
    }

    /// Unexplored coordinates in row-major order.
    pub fn unexplored(&self) -> Vec<GridCoord> {
        self.coords().filter(|&c| !self.is_explored(c)).collect()
    }

    // ── Mutation ────────────────────────────────────────────────────────────

    /// Mark `coord` explored.  Returns `true` if the flag changed.
    pub fn mark_explored(&mut self, coord: GridCoord) -> bool {
        match self.index(coord) {
            Some(idx) if !self.cells[idx].explored => {
                self.cells[idx].explored = true;
                true
            }
            _ => false,
        }
    }

    /// Mark `coord` explored and clear of obstacles.
    pub fn mark_free(&mut self, coord: GridCoord) {
        self.mark_explored(coord);
        self.set_obstacle(coord, false);
    }

    /// Set or clear the obstacle flag and refresh the surrounding virtual
    /// walls.
    ///
    /// Obstacles are never recorded inside the start or goal zone; such
    /// requests are ignored.  Returns `true` if the flag changed.
    pub fn set_obstacle(&mut self, coord: GridCoord, obstacle: bool) -> bool {
        if obstacle && (self.in_start_zone(coord) || self.in_goal_zone(coord)) {
            return false;
        }
        let Some(idx) = self.index(coord) else {
            return false;
        };
        if self.cells[idx].obstacle == obstacle {
            return false;
        }
        self.cells[idx].obstacle = obstacle;
        self.refresh_virtual_walls(coord);
        true
    }

    /// Mark the 3×3 start zone explored and free.
    pub fn mark_start_zone(&mut self) {
        let start = self.geometry.start;
        for dr in -1..=1 {
            for dc in -1..=1 {
                self.mark_free(start.offset(dr, dc));
            }
        }
    }

    /// Mark every cell explored.  Used for ground-truth maps, which are fully
    /// known by construction.
    pub fn mark_all_explored(&mut self) {
        for cell in &mut self.cells {
            cell.explored = true;
        }
    }

    fn refresh_virtual_walls(&mut self, around: GridCoord) {
        for dr in -1..=1 {
            for dc in -1..=1 {
                let coord = around.offset(dr, dc);
                let wall = self.on_border(coord)
                    || self
                        .neighbours(coord)
                        .into_iter()
                        .any(|n| self.is_obstacle(n));
                if let Some(idx) = self.index(coord) {
                    self.cells[idx].virtual_wall = wall;
                }
            }
        }
    }
}

/// North row first: `#` obstacle, `.` explored free, `?` unexplored.
impl fmt::Display for GridMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..self.geometry.rows).rev() {
            for col in 0..self.geometry.cols {
                let c = GridCoord::new(row, col);
                let ch = if self.is_obstacle(c) {
                    '#'
                } else if self.is_explored(c) {
                    '.'
                } else {
                    '?'
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
