//! Wire framing.
//!
//! All traffic is plain text.  Outbound frames are `|`-delimited and routed by
//! their second field (`Ard` for the microcontroller, `And` for the app);
//! they carry no line terminator.  Inbound traffic is newline-delimited.
//!
//! | Frame | Meaning |
//! |---|---|
//! | `Alg\|Ard\|<code>\|` | Movement instruction (`F`, `B`, `L`, `R`, `C`, or `A`..`Z` for a forward run of 1..26 cells) |
//! | `Alg\|And\|rp\|<row>\|<col>\|<dir>\|` | Robot pose |
//! | `Alg\|And\|fp\|<count>\|<dir>\|` | Forward-run telemetry |
//! | `Alg\|And\|md1\|<p1>\|and\|And\|md2\|<p2>\|` | Discovered map descriptor |
//! | `SDATA\|d0, d1, d2, d3, d4, d5` | Six sensor distances, `-1` = nothing in range |
//! | `EX_START` / `FP_START` | App starts exploration / fastest path |
//! | `WAY_POINT\|Waypoint: <row>,<col>` | App sets the fastest-path waypoint |

use gridscout_types::{Direction, GridCoord, Movement, Pose, SensorReadings};
use thiserror::Error;

/// Longest forward run a single instruction letter can encode.
pub const MAX_FORWARD_RUN: usize = 26;

const SENSOR_DATA: &str = "SDATA";
const EX_START: &str = "EX_START";
const FP_START: &str = "FP_START";
const WAY_POINT: &str = "WAY_POINT";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("forward run of {0} cells cannot be encoded (1..=26)")]
    RunLength(usize),

    #[error("expected 6 sensor values, got {0}")]
    SensorCount(usize),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("malformed {kind} message: {line:?}")]
    Malformed { kind: &'static str, line: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A single primitive movement for the microcontroller.
    Instruction(Movement),
    /// A compressed forward run of `n` cells for the microcontroller.
    ForwardRun(usize),
    /// Pose update for the app.
    Pose(Pose),
    /// Forward-run update for the app.
    ForwardRunTelemetry { count: usize, direction: Direction },
    /// Map descriptor for the app.
    MapDescriptor { part1: String, part2: String },
}

impl OutboundMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let frame = match self {
            OutboundMessage::Instruction(m) => format!("Alg|Ard|{}|", m.code()),
            OutboundMessage::ForwardRun(n) => format!("Alg|Ard|{}|", run_letter(*n)?),
            OutboundMessage::Pose(p) => {
                format!("Alg|And|rp|{}|{}|{}|", p.row, p.col, p.direction.letter())
            }
            OutboundMessage::ForwardRunTelemetry { count, direction } => {
                format!("Alg|And|fp|{count}|{}|", direction.letter())
            }
            OutboundMessage::MapDescriptor { part1, part2 } => {
                format!("Alg|And|md1|{part1}|and|And|md2|{part2}|")
            }
        };
        Ok(frame)
    }
}

/// `A` for one cell, `B` for two, … `Z` for twenty-six.
fn run_letter(n: usize) -> Result<char, ProtocolError> {
    if !(1..=MAX_FORWARD_RUN).contains(&n) {
        return Err(ProtocolError::RunLength(n));
    }
    Ok(char::from(b'A' + (n - 1) as u8))
}

// ────────────────────────────────────────────────────────────────────────────
// Inbound
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    SensorData(SensorReadings),
    ExplorationStart,
    FastestPathStart,
    Waypoint(GridCoord),
    /// Anything the algorithm side does not handle.
    Unknown(String),
}

impl InboundMessage {
    /// Parse one received line.  Unrecognised frames are returned as
    /// [`InboundMessage::Unknown`]; recognised frames with a broken body are
    /// errors.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let (kind, body) = match line.split_once('|') {
            Some((kind, body)) => (kind.trim(), Some(body)),
            None => (line, None),
        };

        match (kind, body) {
            (SENSOR_DATA, Some(body)) => parse_sensor_data(body).map(Self::SensorData),
            (EX_START, _) => Ok(Self::ExplorationStart),
            (FP_START, _) => Ok(Self::FastestPathStart),
            (WAY_POINT, Some(body)) => parse_waypoint(body).map(Self::Waypoint),
            (SENSOR_DATA, None) => Err(ProtocolError::Malformed {
                kind: SENSOR_DATA,
                line: line.to_string(),
            }),
            (WAY_POINT, None) => Err(ProtocolError::Malformed {
                kind: WAY_POINT,
                line: line.to_string(),
            }),
            _ => Ok(Self::Unknown(line.to_string())),
        }
    }
}

fn parse_int(raw: &str) -> Result<i64, ProtocolError> {
    let raw = raw.trim();
    raw.parse()
        .map_err(|_| ProtocolError::InvalidNumber(raw.to_string()))
}

fn parse_sensor_data(body: &str) -> Result<SensorReadings, ProtocolError> {
    let values: Vec<&str> = body.trim_end_matches('|').split(',').collect();
    if values.len() != 6 {
        return Err(ProtocolError::SensorCount(values.len()));
    }
    let mut readings: SensorReadings = [None; 6];
    for (slot, raw) in readings.iter_mut().zip(values) {
        let value = parse_int(raw)?;
        *slot = usize::try_from(value).ok();
    }
    Ok(readings)
}

fn parse_waypoint(body: &str) -> Result<GridCoord, ProtocolError> {
    let coords = body.rsplit(':').next().unwrap_or(body);
    let Some((row, col)) = coords.split_once(',') else {
        return Err(ProtocolError::Malformed {
            kind: WAY_POINT,
            line: body.to_string(),
        });
    };
    Ok(GridCoord::new(
        parse_int(row)? as i32,
        parse_int(col)? as i32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_frames() {
        assert_eq!(
            OutboundMessage::Instruction(Movement::TurnLeft).encode().unwrap(),
            "Alg|Ard|L|"
        );
        assert_eq!(
            OutboundMessage::Instruction(Movement::Calibrate).encode().unwrap(),
            "Alg|Ard|C|"
        );
    }

    #[test]
    fn forward_run_letters() {
        assert_eq!(OutboundMessage::ForwardRun(1).encode().unwrap(), "Alg|Ard|A|");
        assert_eq!(OutboundMessage::ForwardRun(5).encode().unwrap(), "Alg|Ard|E|");
        assert_eq!(OutboundMessage::ForwardRun(26).encode().unwrap(), "Alg|Ard|Z|");
        assert_eq!(
            OutboundMessage::ForwardRun(0).encode(),
            Err(ProtocolError::RunLength(0))
        );
        assert_eq!(
            OutboundMessage::ForwardRun(27).encode(),
            Err(ProtocolError::RunLength(27))
        );
    }

    #[test]
    fn app_frames() {
        let pose = OutboundMessage::Pose(Pose::new(4, 2, Direction::East));
        assert_eq!(pose.encode().unwrap(), "Alg|And|rp|4|2|E|");

        let run = OutboundMessage::ForwardRunTelemetry {
            count: 3,
            direction: Direction::South,
        };
        assert_eq!(run.encode().unwrap(), "Alg|And|fp|3|S|");

        let md = OutboundMessage::MapDescriptor {
            part1: "FF".into(),
            part2: "00".into(),
        };
        assert_eq!(md.encode().unwrap(), "Alg|And|md1|FF|and|And|md2|00|");
    }

    #[test]
    fn sensor_data_parses_in_order() {
        let msg = InboundMessage::parse("SDATA|3, 5, 2, -1, 162, 3").unwrap();
        assert_eq!(
            msg,
            InboundMessage::SensorData([Some(3), Some(5), Some(2), None, Some(162), Some(3)])
        );
    }

    #[test]
    fn sensor_data_errors() {
        assert_eq!(
            InboundMessage::parse("SDATA|1, 2, 3"),
            Err(ProtocolError::SensorCount(3))
        );
        assert_eq!(
            InboundMessage::parse("SDATA|1, 2, x, 4, 5, 6"),
            Err(ProtocolError::InvalidNumber("x".into()))
        );
        assert!(matches!(
            InboundMessage::parse("SDATA"),
            Err(ProtocolError::Malformed { kind: "SDATA", .. })
        ));
    }

    #[test]
    fn app_commands() {
        assert_eq!(
            InboundMessage::parse("EX_START\n").unwrap(),
            InboundMessage::ExplorationStart
        );
        assert_eq!(
            InboundMessage::parse("FP_START").unwrap(),
            InboundMessage::FastestPathStart
        );
        assert_eq!(
            InboundMessage::parse("WAY_POINT|Waypoint: 10,8").unwrap(),
            InboundMessage::Waypoint(GridCoord::new(10, 8))
        );
    }

    #[test]
    fn unknown_frames_are_passed_through() {
        assert_eq!(
            InboundMessage::parse("HELLO|world").unwrap(),
            InboundMessage::Unknown("HELLO|world".into())
        );
    }
}
