//! Text arena layouts.
//!
//! A layout describes a ground-truth arena, one line per row with the north
//! row first.  `1` or `#` is an obstacle, `0` or `.` is free.  Blank lines and
//! surrounding whitespace are ignored.
//!
//! ```text
//! ...............
//! ...............
//! .....###.......
//! ...............
//! ```
//!
//! The start zone sits in the south-west corner and the goal zone in the
//! north-east corner; a layout that puts an obstacle inside either is
//! rejected.

use std::path::Path;

use gridscout_types::{GridCoord, ScoutError};
use thiserror::Error;
use tracing::debug;

use crate::grid::{ArenaGeometry, GridMap};

#[derive(Error, Debug)]
pub enum MapError {
    #[error("layout is empty")]
    Empty,

    #[error("arena must be at least 3×3, got {rows}×{cols}")]
    TooSmall { rows: usize, cols: usize },

    #[error("line {line}: expected {expected} cells, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}, column {column}: unexpected character {ch:?}")]
    InvalidCell { line: usize, column: usize, ch: char },

    #[error("obstacle at {0} lies inside the start or goal zone")]
    ZoneBlocked(GridCoord),

    #[error("failed to read layout: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MapError> for ScoutError {
    fn from(err: MapError) -> Self {
        ScoutError::Map(err.to_string())
    }
}

/// Parse a layout into a fully explored ground-truth map.
pub fn parse_layout(text: &str) -> Result<GridMap, MapError> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    let Some(&(_, first)) = lines.first() else {
        return Err(MapError::Empty);
    };
    let rows = lines.len();
    let cols = first.chars().count();
    if rows < 3 || cols < 3 {
        return Err(MapError::TooSmall { rows, cols });
    }

    let mut map = GridMap::new(ArenaGeometry::with_size(rows as i32, cols as i32));
    map.mark_all_explored();

    for (i, &(line, content)) in lines.iter().enumerate() {
        let found = content.chars().count();
        if found != cols {
            return Err(MapError::RaggedRow {
                line,
                expected: cols,
                found,
            });
        }
        let row = (rows - 1 - i) as i32;
        for (col, ch) in content.chars().enumerate() {
            let obstacle = match ch {
                '1' | '#' => true,
                '0' | '.' => false,
                _ => {
                    return Err(MapError::InvalidCell {
                        line,
                        column: col + 1,
                        ch,
                    });
                }
            };
            let coord = GridCoord::new(row, col as i32);
            if obstacle {
                if map.in_start_zone(coord) || map.in_goal_zone(coord) {
                    return Err(MapError::ZoneBlocked(coord));
                }
                map.set_obstacle(coord, true);
            }
        }
    }

    debug!(rows, cols, "parsed arena layout");
    Ok(map)
}

/// Read and parse a layout file.
pub fn load_layout(path: &Path) -> Result<GridMap, MapError> {
    let text = std::fs::read_to_string(path)?;
    parse_layout(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "
        ........
        ........
        ........
        ..#.....
        ........
        ........
        ........
    ";

    #[test]
    fn north_row_comes_first() {
        let map = parse_layout(SMALL).unwrap();
        assert_eq!((map.rows(), map.cols()), (7, 8));
        assert!(map.is_obstacle(GridCoord::new(3, 2)));
        assert!(!map.is_obstacle(GridCoord::new(3, 3)));
        assert_eq!(map.goal(), GridCoord::new(5, 6));
        assert_eq!(map.explored_count(), 56);
    }

    #[test]
    fn digits_and_symbols_are_equivalent() {
        let a = parse_layout("0000000\n0000000\n0100000\n0000000\n0000000\n0000000").unwrap();
        let b = parse_layout(".......\n.......\n.#.....\n.......\n.......\n.......").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = parse_layout("....\n...\n....").unwrap_err();
        assert!(matches!(
            err,
            MapError::RaggedRow {
                line: 2,
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn unknown_characters_are_rejected() {
        let err = parse_layout("....\n..x.\n....").unwrap_err();
        assert!(matches!(err, MapError::InvalidCell { ch: 'x', .. }));
    }

    #[test]
    fn zone_obstacles_are_rejected() {
        let err = parse_layout("......\n......\n......\n......\n.#....").unwrap_err();
        assert!(matches!(err, MapError::ZoneBlocked(c) if c == GridCoord::new(0, 1)));
    }

    #[test]
    fn empty_and_tiny_layouts_are_rejected() {
        assert!(matches!(parse_layout("\n \n"), Err(MapError::Empty)));
        assert!(matches!(
            parse_layout("..\n.."),
            Err(MapError::TooSmall { rows: 2, cols: 2 })
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.txt");
        std::fs::write(&path, SMALL).unwrap();
        let map = load_layout(&path).unwrap();
        assert!(map.is_obstacle(GridCoord::new(3, 2)));

        let missing = load_layout(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(missing, MapError::Io(_)));
    }

    #[test]
    fn map_error_converts_to_scout_error() {
        let err: ScoutError = MapError::Empty.into();
        assert!(matches!(err, ScoutError::Map(msg) if msg.contains("empty")));
    }
}
