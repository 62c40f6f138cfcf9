//! `gridscout-types` – shared vocabulary for the gridscout workspace.
//!
//! Every other crate speaks in terms of these types: grid coordinates, the
//! four-way [`Direction`] cycle, primitive [`Movement`]s, the robot [`Pose`],
//! the fixed [`SensorId`] constellation, bus [`Event`]s, and the
//! workspace-wide [`ScoutError`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Direction
// ────────────────────────────────────────────────────────────────────────────

/// Facing of the robot or of a single sensor.
///
/// The variants are declared in clockwise order, so the ordinal of each
/// variant is its number of quarter turns clockwise from North.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four directions in clockwise order starting at North.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// The direction reached by a 90° clockwise turn.
    pub fn clockwise(self) -> Self {
        Self::ALL[(self.ordinal() + 1) % 4]
    }

    /// The direction reached by a 90° counter-clockwise turn.
    pub fn counter_clockwise(self) -> Self {
        Self::ALL[(self.ordinal() + 3) % 4]
    }

    /// The direction facing the other way.
    pub fn opposite(self) -> Self {
        Self::ALL[(self.ordinal() + 2) % 4]
    }

    /// Unit `(row, col)` step of one cell in this direction.
    ///
    /// Rows grow northwards and columns grow eastwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (1, 0),
            Direction::East => (0, 1),
            Direction::South => (-1, 0),
            Direction::West => (0, -1),
        }
    }

    /// Single-letter code used on the wire (`N`, `E`, `S`, `W`).
    pub fn letter(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        }
    }

    /// Number of clockwise quarter turns from `self` to `target` (0–3).
    pub fn quarter_turns_to(self, target: Direction) -> usize {
        (target.ordinal() + 4 - self.ordinal()) % 4
    }

    fn ordinal(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Movement
// ────────────────────────────────────────────────────────────────────────────

/// Primitive robot movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    /// Drift correction against a flat face; the pose is unchanged.
    Calibrate,
}

impl Movement {
    /// Single-letter instruction code sent to the microcontroller.
    pub fn code(self) -> char {
        match self {
            Movement::Forward => 'F',
            Movement::Backward => 'B',
            Movement::TurnLeft => 'L',
            Movement::TurnRight => 'R',
            Movement::Calibrate => 'C',
        }
    }

    /// `true` for the two in-place rotations.
    pub fn is_turn(self) -> bool {
        matches!(self, Movement::TurnLeft | Movement::TurnRight)
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Coordinates and pose
// ────────────────────────────────────────────────────────────────────────────

/// A `(row, col)` cell coordinate.
///
/// Signed so that offsets past the arena edge can be represented and then
/// rejected by the map's bounds check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub row: i32,
    pub col: i32,
}

impl GridCoord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The coordinate `steps` cells away in `direction`.
    pub fn step(self, direction: Direction, steps: i32) -> Self {
        let (dr, dc) = direction.delta();
        Self::new(self.row + dr * steps, self.col + dc * steps)
    }

    /// Translate by a raw `(row, col)` offset.
    pub fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(self, other: GridCoord) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Centre cell of the robot's 3×3 footprint plus its facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pose {
    pub row: i32,
    pub col: i32,
    pub direction: Direction,
}

impl Pose {
    pub const fn new(row: i32, col: i32, direction: Direction) -> Self {
        Self {
            row,
            col,
            direction,
        }
    }

    pub fn coord(&self) -> GridCoord {
        GridCoord::new(self.row, self.col)
    }

    /// Pose after executing `movement` from this one.
    pub fn after(self, movement: Movement) -> Pose {
        let Pose {
            row,
            col,
            direction,
        } = self;
        match movement {
            Movement::Forward | Movement::Backward => {
                let steps = if movement == Movement::Forward { 1 } else { -1 };
                let c = self.coord().step(direction, steps);
                Pose::new(c.row, c.col, direction)
            }
            Movement::TurnLeft => Pose::new(row, col, direction.counter_clockwise()),
            Movement::TurnRight => Pose::new(row, col, direction.clockwise()),
            Movement::Calibrate => self,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensors
// ────────────────────────────────────────────────────────────────────────────

/// The six sensors mounted on the robot, in the fixed reading order used by
/// the simulator, the firmware, and the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorId {
    FrontLeft,
    FrontCenter,
    FrontRight,
    LeftShort,
    RightShort,
    LeftLong,
}

impl SensorId {
    /// Reading order: `[front-left, front-center, front-right, left-short,
    /// right-short, left-long]`.
    pub const ALL: [SensorId; 6] = [
        SensorId::FrontLeft,
        SensorId::FrontCenter,
        SensorId::FrontRight,
        SensorId::LeftShort,
        SensorId::RightShort,
        SensorId::LeftLong,
    ];

    /// `true` for the three sensors that look along the robot's facing.
    pub fn is_front(self) -> bool {
        matches!(
            self,
            SensorId::FrontLeft | SensorId::FrontCenter | SensorId::FrontRight
        )
    }

    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            SensorId::FrontLeft => "SRFL",
            SensorId::FrontCenter => "SRFC",
            SensorId::FrontRight => "SRFR",
            SensorId::LeftShort => "SRL",
            SensorId::RightShort => "SRR",
            SensorId::LeftLong => "LRL",
        }
    }
}

/// One distance per sensor in [`SensorId::ALL`] order.  `None` means no
/// obstacle within range.
pub type SensorReadings = [Option<usize>; 6];

// ────────────────────────────────────────────────────────────────────────────
// Events
// ────────────────────────────────────────────────────────────────────────────

/// Envelope for everything published on the telemetry bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"gridscout-runtime::explorer"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a new event with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Session telemetry variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// The robot's pose after a move.
    Pose(Pose),
    /// Coverage after a sense cycle.
    Coverage { explored: usize, total: usize },
    /// The sweep attempted a detour toward `target`.
    Detour { target: GridCoord, reached: bool },
    /// Coarse session milestones ("exploration started", "going home", …).
    Milestone(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoutError {
    #[error("unsafe move {movement}: {reason}")]
    UnsafeMove { movement: Movement, reason: String },

    #[error("timed out waiting for sensor data")]
    SensorTimeout,

    #[error("messaging bridge error: {0}")]
    Bridge(String),

    #[error("invalid map: {0}")]
    Map(String),

    #[error("configuration error: {0}")]
    Config(String),
}
