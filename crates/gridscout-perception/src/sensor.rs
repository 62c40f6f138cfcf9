//! Directional proximity sensors.
//!
//! A [`Sensor`] sits on one cell of the robot's footprint and looks along a
//! fixed facing.  Cells closer than `min` form a blind zone: they can block
//! the beam but are never recorded.  Cells from `min` to `max` (inclusive)
//! are fused into the discovered map.
//!
//! Two fusion paths exist:
//!
//! - [`Sensor::sense`] ray-marches against a ground-truth map (simulation).
//! - [`Sensor::sense_real`] applies a distance reported by hardware.

use gridscout_types::{Direction, GridCoord, SensorId};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::grid::GridMap;

/// Inclusive detection range in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRange {
    pub min: usize,
    pub max: usize,
}

impl SensorRange {
    pub const SHORT: SensorRange = SensorRange { min: 1, max: 2 };
    pub const LONG: SensorRange = SensorRange { min: 3, max: 4 };

    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    id: SensorId,
    range: SensorRange,
    origin: GridCoord,
    facing: Direction,
}

impl Sensor {
    pub fn new(id: SensorId, range: SensorRange, origin: GridCoord, facing: Direction) -> Self {
        Self {
            id,
            range,
            origin,
            facing,
        }
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn range(&self) -> SensorRange {
        self.range
    }

    pub fn origin(&self) -> GridCoord {
        self.origin
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    /// Move the sensor to a new cell and facing.  Ranges are unchanged.
    pub fn set_position(&mut self, row: i32, col: i32, facing: Direction) {
        self.origin = GridCoord::new(row, col);
        self.facing = facing;
    }

    fn cell_at(&self, distance: usize) -> GridCoord {
        self.origin.step(self.facing, distance as i32)
    }

    /// Ray-march against `truth` and record what is seen in `discovered`.
    ///
    /// Returns the distance to the first blocking cell, or `None` when the
    /// beam runs its full range.  Hitting the arena edge at or before the
    /// first in-range cell also yields `None`.
    pub fn sense(&self, discovered: &mut GridMap, truth: &GridMap) -> Option<usize> {
        for d in 1..self.range.min {
            let cell = self.cell_at(d);
            if !truth.contains(cell) {
                return None;
            }
            if truth.is_obstacle(cell) {
                trace!(sensor = self.id.label(), distance = d, "blocked in blind zone");
                return Some(d);
            }
        }

        for d in self.range.min..=self.range.max {
            let cell = self.cell_at(d);
            if !discovered.contains(cell) {
                return (d != self.range.min).then_some(d);
            }
            if truth.is_obstacle(cell) {
                discovered.mark_explored(cell);
                discovered.set_obstacle(cell, true);
                trace!(sensor = self.id.label(), %cell, "obstacle");
                return Some(d);
            }
            discovered.mark_free(cell);
        }
        None
    }

    /// Fuse a hardware reading into `discovered`.
    ///
    /// `reading` is the distance to the detected obstacle, or `None` when
    /// nothing was detected within range.
    pub fn sense_real(&self, discovered: &mut GridMap, reading: Option<usize>) {
        if reading.is_some_and(|d| d < self.range.min) {
            return;
        }

        for d in 1..self.range.min {
            let cell = self.cell_at(d);
            if !discovered.contains(cell) || discovered.is_obstacle(cell) {
                return;
            }
        }

        for d in self.range.min..=self.range.max {
            let cell = self.cell_at(d);
            if !discovered.contains(cell) {
                return;
            }
            discovered.mark_explored(cell);

            if reading == Some(d) {
                discovered.set_obstacle(cell, true);
                trace!(sensor = self.id.label(), %cell, "obstacle");
                return;
            }

            if discovered.is_obstacle(cell) {
                if self.id.is_front() {
                    discovered.set_obstacle(cell, false);
                    trace!(sensor = self.id.label(), %cell, "obstacle cleared");
                } else {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ArenaGeometry;

    fn blank() -> GridMap {
        GridMap::new(ArenaGeometry::default())
    }

    fn truth_with(obstacles: &[GridCoord]) -> GridMap {
        let mut truth = blank();
        truth.mark_all_explored();
        for &o in obstacles {
            truth.set_obstacle(o, true);
        }
        truth
    }

    fn short_north(origin: GridCoord) -> Sensor {
        Sensor::new(SensorId::FrontCenter, SensorRange::SHORT, origin, Direction::North)
    }

    #[test]
    fn set_position_keeps_range() {
        let mut s = Sensor::new(
            SensorId::LeftLong,
            SensorRange::LONG,
            GridCoord::new(1, 0),
            Direction::West,
        );
        s.set_position(4, 4, Direction::South);
        assert_eq!(s.origin(), GridCoord::new(4, 4));
        assert_eq!(s.facing(), Direction::South);
        assert_eq!(s.range(), SensorRange::LONG);
    }

    #[test]
    fn open_ray_marks_every_cell_free() {
        let truth = truth_with(&[]);
        let mut map = blank();
        let s = short_north(GridCoord::new(5, 5));
        assert_eq!(s.sense(&mut map, &truth), None);
        assert!(map.is_explored_free(GridCoord::new(6, 5)));
        assert!(map.is_explored_free(GridCoord::new(7, 5)));
        assert!(!map.is_explored(GridCoord::new(8, 5)));
    }

    #[test]
    fn first_obstacle_is_the_only_obstacle_on_the_ray() {
        let truth = truth_with(&[GridCoord::new(8, 5), GridCoord::new(9, 5)]);
        let mut map = blank();
        let s = Sensor::new(
            SensorId::FrontCenter,
            SensorRange::new(1, 5),
            GridCoord::new(5, 5),
            Direction::North,
        );
        assert_eq!(s.sense(&mut map, &truth), Some(3));
        assert!(map.is_explored_free(GridCoord::new(6, 5)));
        assert!(map.is_explored_free(GridCoord::new(7, 5)));
        assert!(map.is_obstacle(GridCoord::new(8, 5)));
        assert!(map.is_explored(GridCoord::new(8, 5)));
        assert!(!map.is_explored(GridCoord::new(9, 5)));
    }

    #[test]
    fn edge_on_first_examined_cell_reads_none() {
        let truth = truth_with(&[]);
        let mut map = blank();
        let s = short_north(GridCoord::new(19, 5));
        assert_eq!(s.sense(&mut map, &truth), None);
        assert_eq!(map.explored_count(), 0);
    }

    #[test]
    fn edge_after_first_cell_reads_distance() {
        let truth = truth_with(&[]);
        let mut map = blank();
        let s = short_north(GridCoord::new(18, 5));
        assert_eq!(s.sense(&mut map, &truth), Some(2));
        assert!(map.is_explored_free(GridCoord::new(19, 5)));
    }

    #[test]
    fn blind_zone_blocks_without_marking() {
        let truth = truth_with(&[GridCoord::new(5, 6)]);
        let mut map = blank();
        let s = Sensor::new(
            SensorId::LeftLong,
            SensorRange::LONG,
            GridCoord::new(5, 4),
            Direction::East,
        );
        assert_eq!(s.sense(&mut map, &truth), Some(2));
        assert_eq!(map.explored_count(), 0);
    }

    #[test]
    fn sensing_twice_changes_nothing() {
        let truth = truth_with(&[GridCoord::new(7, 5)]);
        let mut map = blank();
        let s = short_north(GridCoord::new(5, 5));
        s.sense(&mut map, &truth);
        let after_first = map.clone();
        s.sense(&mut map, &truth);
        assert_eq!(map, after_first);
    }

    #[test]
    fn real_reading_marks_obstacle_and_nearer_cells() {
        let mut map = blank();
        let s = short_north(GridCoord::new(5, 5));
        s.sense_real(&mut map, Some(2));
        assert!(map.is_explored_free(GridCoord::new(6, 5)));
        assert!(map.is_obstacle(GridCoord::new(7, 5)));
    }

    #[test]
    fn real_reading_below_min_range_marks_nothing() {
        let mut map = blank();
        let s = Sensor::new(
            SensorId::LeftLong,
            SensorRange::LONG,
            GridCoord::new(5, 4),
            Direction::East,
        );
        s.sense_real(&mut map, Some(2));
        s.sense_real(&mut map, Some(0));
        assert_eq!(map.explored_count(), 0);
    }

    #[test]
    fn known_obstacle_in_blind_zone_stops_update() {
        let mut map = blank();
        map.set_obstacle(GridCoord::new(5, 6), true);
        let s = Sensor::new(
            SensorId::LeftLong,
            SensorRange::LONG,
            GridCoord::new(5, 4),
            Direction::East,
        );
        s.sense_real(&mut map, None);
        assert!(!map.is_explored(GridCoord::new(5, 7)));
    }

    #[test]
    fn front_sensor_clears_stale_obstacle() {
        let mut map = blank();
        map.mark_explored(GridCoord::new(6, 5));
        map.set_obstacle(GridCoord::new(6, 5), true);
        let s = short_north(GridCoord::new(5, 5));
        s.sense_real(&mut map, None);
        assert!(map.is_explored_free(GridCoord::new(6, 5)));
        assert!(map.is_explored_free(GridCoord::new(7, 5)));
    }

    #[test]
    fn side_sensor_stops_at_known_obstacle() {
        let mut map = blank();
        map.mark_explored(GridCoord::new(6, 5));
        map.set_obstacle(GridCoord::new(6, 5), true);
        let s = Sensor::new(
            SensorId::LeftShort,
            SensorRange::SHORT,
            GridCoord::new(5, 5),
            Direction::North,
        );
        s.sense_real(&mut map, None);
        assert!(map.is_obstacle(GridCoord::new(6, 5)));
        assert!(!map.is_explored(GridCoord::new(7, 5)));
    }
}
