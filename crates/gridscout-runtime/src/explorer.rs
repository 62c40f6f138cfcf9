//! [`Explorer`] – the exploration controller.
//!
//! One session runs in three phases:
//!
//! 1. **Explore** – wall-hug with the right-hand rule from the start cell.
//!    Every move is followed by a sense cycle, and every forward step is
//!    checked by the [`MoveVerifier`] first.
//! 2. **Sweep** – each time the robot is back on its starting cell, every
//!    still-unexplored cell is visited in row-major order and the
//!    [`PathFinder`] is asked to reach one of its explored, traversable
//!    neighbours outside the start zone.  Stops at the first success per
//!    cell; a deadline overrun latches `times_up` and aborts the sweep.
//! 3. **Go home** – optionally via the goal (see [`GoalVisitPolicy`]), then
//!    back to the start, then turn to face North.
//!
//! Exploration ends when coverage passes the limit, the deadline passes,
//! the map saturates after a sweep, or the [`ProgressGuard`] reports no
//! coverage gain.  There is no fatal path: failed moves, sensor timeouts
//! and unreachable targets are logged and the session carries on.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use gridscout_hal::{Robot, SimulatedBackend};
//! use gridscout_perception::{ArenaGeometry, GridMap};
//! use gridscout_runtime::{Explorer, ExplorerConfig, FastestPath, StopReason};
//! use gridscout_types::{Direction, Pose};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut truth = GridMap::new(ArenaGeometry::default());
//! truth.mark_all_explored();
//!
//! let discovered = GridMap::new(truth.geometry());
//! let robot = Robot::new(
//!     Pose::new(1, 1, Direction::North),
//!     truth.goal(),
//!     Box::new(SimulatedBackend::new(truth, Duration::ZERO)),
//! );
//!
//! let mut explorer = Explorer::new(
//!     discovered,
//!     robot,
//!     Box::new(FastestPath::new()),
//!     ExplorerConfig::default(),
//! );
//! let report = explorer.run_exploration().await;
//! assert_eq!(report.stop_reason, StopReason::FullyExplored);
//! assert_eq!(report.final_pose, Pose::new(1, 1, Direction::North));
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gridscout_hal::{DriveMode, Robot};
use gridscout_kernel::{GoalVisitPolicy, MoveIntent, MoveVerifier, SessionBudget};
use gridscout_middleware::{EventBus, Topic};
use gridscout_perception::GridMap;
use gridscout_types::{Direction, Event, EventPayload, GridCoord, Movement, Pose};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::path_finder::{PathFinder, RouteOutcome, RouteRequest};
use crate::progress_guard::{DEFAULT_MAX_IDLE_LAPS, ProgressGuard};

const SOURCE: &str = "gridscout-runtime::explorer";

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// On-the-spot calibration against flat faces.  Only acts in physical mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub enabled: bool,
    /// Moves without calibration before actively turning to a face.
    pub every: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            every: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Exploration continues while no more than this many cells are explored.
    pub coverage_limit: usize,
    pub time_limit: Duration,
    pub goal_visit: GoalVisitPolicy,
    pub calibration: CalibrationConfig,
    /// Consecutive moves without a new cell before giving up.  `None` allows
    /// four moves per arena cell.
    pub max_idle_moves: Option<usize>,
    /// Consecutive sweeps without a new cell before giving up.
    pub max_idle_laps: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            coverage_limit: 300,
            time_limit: Duration::from_secs(360),
            goal_visit: GoalVisitPolicy::default(),
            calibration: CalibrationConfig::default(),
            max_idle_moves: None,
            max_idle_laps: DEFAULT_MAX_IDLE_LAPS,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    CoverageReached,
    TimeExpired,
    FullyExplored,
    NoProgress,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::CoverageReached => "coverage limit reached",
            StopReason::TimeExpired => "time limit expired",
            StopReason::FullyExplored => "arena fully explored",
            StopReason::NoProgress => "no further progress",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub explored: usize,
    pub total: usize,
    pub coverage_percent: f64,
    pub elapsed_secs: f64,
    pub touched_goal: bool,
    pub times_up: bool,
    pub final_pose: Pose,
}

impl fmt::Display for ExplorationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "explored {}/{} cells ({:.2}%) in {:.1}s, {}",
            self.explored, self.total, self.coverage_percent, self.elapsed_secs, self.stop_reason
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Explorer
// ────────────────────────────────────────────────────────────────────────────

pub struct Explorer {
    map: GridMap,
    robot: Robot,
    finder: Box<dyn PathFinder>,
    config: ExplorerConfig,
    budget: SessionBudget,
    verifier: MoveVerifier,
    guard: ProgressGuard,
    bus: Option<EventBus>,
    area_explored: usize,
    moves_since_calibration: usize,
}

impl Explorer {
    /// `map` is the discovered map the session starts from, normally fully
    /// unexplored.
    pub fn new(
        map: GridMap,
        robot: Robot,
        finder: Box<dyn PathFinder>,
        config: ExplorerConfig,
    ) -> Self {
        let max_idle_moves = config
            .max_idle_moves
            .unwrap_or(4 * map.total_cells());
        Self {
            budget: SessionBudget::new(config.coverage_limit, config.time_limit),
            guard: ProgressGuard::new(max_idle_moves, config.max_idle_laps),
            verifier: MoveVerifier::standard(),
            area_explored: map.explored_count(),
            map,
            robot,
            finder,
            config,
            bus: None,
            moves_since_calibration: 0,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn map(&self) -> &GridMap {
        &self.map
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn budget(&self) -> &SessionBudget {
        &self.budget
    }

    pub fn area_explored(&self) -> usize {
        self.area_explored
    }

    /// Hand back the discovered map and the robot, e.g. for a fastest-path
    /// run after exploration.
    pub fn into_parts(self) -> (GridMap, Robot) {
        (self.map, self.robot)
    }

    /// Run a full session: explore, sweep, go home, and report.
    pub async fn run_exploration(&mut self) -> ExplorationReport {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = self.budget.start();
        self.robot.set_session_deadline(Some(deadline));
        info!(%session_id, mode = %self.robot.mode(), "exploration started");
        self.milestone("exploration started");

        self.map.mark_start_zone();
        self.sense().await;
        self.area_explored = self.map.explored_count();

        let origin = self.robot.coord();
        let stop_reason = self.explore_from(origin).await;
        info!(%stop_reason, explored = self.area_explored, "exploration finished");
        self.milestone(&format!("exploration finished: {stop_reason}"));

        self.robot.set_session_deadline(None);
        self.go_home().await;

        let explored = self.map.explored_count();
        let total = self.map.total_cells();
        let report = ExplorationReport {
            session_id,
            started_at,
            stop_reason,
            explored,
            total,
            coverage_percent: explored as f64 / total as f64 * 100.0,
            elapsed_secs: self.budget.elapsed().as_secs_f64(),
            touched_goal: self.robot.touched_goal(),
            times_up: self.budget.times_up(),
            final_pose: self.robot.pose(),
        };
        info!(%report, "session complete");
        report
    }

    async fn explore_from(&mut self, origin: GridCoord) -> StopReason {
        loop {
            self.next_move().await;
            self.area_explored = self.map.explored_count();
            if self.guard.record_move(self.area_explored) {
                return StopReason::NoProgress;
            }

            if self.robot.coord() == origin {
                self.sweep().await;
                self.area_explored = self.map.explored_count();
                if self.map.is_saturated() {
                    return StopReason::FullyExplored;
                }
                if self.guard.record_lap(self.area_explored) {
                    return StopReason::NoProgress;
                }
            }

            if !self.budget.allows(self.area_explored) {
                return if self.area_explored > self.budget.coverage_limit() {
                    StopReason::CoverageReached
                } else {
                    StopReason::TimeExpired
                };
            }
        }
    }

    // ── Wall hugging ────────────────────────────────────────────────────────

    /// One right-hand-rule decision: prefer right, then ahead, then left,
    /// otherwise turn around.
    pub async fn next_move(&mut self) {
        let facing = self.robot.direction();
        if self.is_free(facing.clockwise()) {
            self.move_bot(Movement::TurnRight).await;
            if self.is_free(self.robot.direction()) {
                self.move_bot(Movement::Forward).await;
            }
        } else if self.is_free(facing) {
            self.move_bot(Movement::Forward).await;
        } else if self.is_free(facing.counter_clockwise()) {
            self.move_bot(Movement::TurnLeft).await;
            if self.is_free(self.robot.direction()) {
                self.move_bot(Movement::Forward).await;
            }
        } else {
            self.move_bot(Movement::TurnRight).await;
            self.move_bot(Movement::TurnRight).await;
        }
    }

    /// The row of three cells one step from the centre towards `direction`
    /// is explored and obstacle-free, and its middle is not a virtual wall.
    fn is_free(&self, direction: Direction) -> bool {
        let middle = self.robot.coord().step(direction, 1);
        let (dr, dc) = direction.clockwise().delta();
        let row = [middle.offset(-dr, -dc), middle, middle.offset(dr, dc)];
        row.iter().all(|&c| self.map.is_explored_free(c)) && !self.map.is_virtual_wall(middle)
    }

    async fn move_bot(&mut self, movement: Movement) {
        if self.step(movement).await && movement != Movement::Calibrate {
            self.calibrate_if_due().await;
        }
    }

    /// Execute one movement and re-sense unless it was a calibration.
    /// Returns `false` when the movement was refused or failed.
    async fn step(&mut self, movement: Movement) -> bool {
        if matches!(movement, Movement::Forward | Movement::Backward) {
            let intent = MoveIntent {
                map: &self.map,
                from: self.robot.pose(),
                movement,
            };
            if self.verifier.verify(&intent).is_err() {
                return false;
            }
        }
        if let Err(err) = self.robot.perform(movement).await {
            warn!(%movement, error = %err, "move failed");
            return false;
        }
        if movement != Movement::Calibrate {
            self.sense().await;
        }
        true
    }

    async fn sense(&mut self) {
        match self.robot.sense(&mut self.map).await {
            Ok(readings) => debug!(?readings, "sensed"),
            Err(err) => warn!(error = %err, "sense failed"),
        }
        self.publish(
            Topic::Map,
            EventPayload::Coverage {
                explored: self.map.explored_count(),
                total: self.map.total_cells(),
            },
        );
    }

    // ── Sweep ───────────────────────────────────────────────────────────────

    async fn sweep(&mut self) {
        let pending = self.map.unexplored();
        debug!(unexplored = pending.len(), "sweep started");

        'cells: for cell in pending {
            if self.map.is_explored(cell) {
                continue;
            }
            for target in self.sweep_targets(cell) {
                if self.budget.expired() {
                    self.budget.mark_times_up();
                    break 'cells;
                }
                let mut request = RouteRequest::to(target);
                if let Some(deadline) = self.budget.deadline() {
                    request = request.until(deadline);
                }
                let outcome = self
                    .finder
                    .route(&mut self.map, &mut self.robot, request)
                    .await;
                debug!(%cell, %target, ?outcome, "detour");
                self.publish(
                    Topic::Session,
                    EventPayload::Detour {
                        target,
                        reached: outcome == RouteOutcome::Reached,
                    },
                );
                match outcome {
                    RouteOutcome::Reached => continue 'cells,
                    RouteOutcome::TimedOut => {
                        self.budget.mark_times_up();
                        break 'cells;
                    }
                    RouteOutcome::Unreachable => {}
                }
            }
        }
    }

    /// Explored, traversable neighbours of `cell` outside the start zone, in
    /// row-major order.
    fn sweep_targets(&self, cell: GridCoord) -> Vec<GridCoord> {
        self.map
            .neighbours(cell)
            .into_iter()
            .filter(|&n| self.map.is_traversable_center(n) && !self.map.in_start_zone(n))
            .collect()
    }

    // ── Going home ──────────────────────────────────────────────────────────

    /// Return to the start cell and face North, visiting the goal first when
    /// the policy asks for it and it was never touched.
    pub async fn go_home(&mut self) {
        self.milestone("going home");
        if !self.robot.touched_goal() && self.config.goal_visit.requires_goal_visit(&self.budget) {
            let goal = self.map.goal();
            let outcome = self
                .finder
                .route(&mut self.map, &mut self.robot, RouteRequest::to(goal))
                .await;
            info!(%goal, ?outcome, "goal visit");
        }

        let start = self.map.start();
        let outcome = self
            .finder
            .route(&mut self.map, &mut self.robot, RouteRequest::to(start))
            .await;
        if outcome != RouteOutcome::Reached {
            warn!(%start, ?outcome, "could not return to start");
        }
        self.turn_to(Direction::North).await;
        self.area_explored = self.map.explored_count();
    }

    /// Rotate in place to `target` with at most two turns.
    pub async fn turn_to(&mut self, target: Direction) {
        for &turn in turns_between(self.robot.direction(), target) {
            self.move_bot(turn).await;
        }
    }

    // ── Calibration ─────────────────────────────────────────────────────────

    async fn calibrate_if_due(&mut self) {
        if !self.config.calibration.enabled || self.robot.mode() != DriveMode::Physical {
            return;
        }
        let pose = self.robot.pose();
        if can_calibrate_facing(&self.map, pose.coord(), pose.direction) {
            self.moves_since_calibration = 0;
            self.step(Movement::Calibrate).await;
            return;
        }

        self.moves_since_calibration += 1;
        if self.moves_since_calibration < self.config.calibration.every {
            return;
        }
        if let Some(face) = calibration_direction(&self.map, pose) {
            debug!(%face, "turning to calibrate");
            self.moves_since_calibration = 0;
            for &turn in turns_between(pose.direction, face) {
                self.step(turn).await;
            }
            self.step(Movement::Calibrate).await;
            for &turn in turns_between(face, pose.direction) {
                self.step(turn).await;
            }
        }
    }

    // ── Events ──────────────────────────────────────────────────────────────

    fn milestone(&self, text: &str) {
        self.publish(Topic::Session, EventPayload::Milestone(text.to_string()));
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if let Some(bus) = &self.bus {
            bus.publish(topic, Event::new(SOURCE, payload));
        }
    }
}

/// Shortest turn sequence from `from` to `to`.
fn turns_between(from: Direction, to: Direction) -> &'static [Movement] {
    match from.quarter_turns_to(to) {
        0 => &[],
        1 => &[Movement::TurnRight],
        2 => &[Movement::TurnRight, Movement::TurnRight],
        _ => &[Movement::TurnLeft],
    }
}

/// The three cells two steps from `centre` towards `direction` form a flat
/// face of obstacles or arena edge.
fn can_calibrate_facing(map: &GridMap, centre: GridCoord, direction: Direction) -> bool {
    let ahead = centre.step(direction, 2);
    let (dr, dc) = direction.clockwise().delta();
    (-1..=1).all(|k| map.is_obstacle_or_wall(ahead.offset(dr * k, dc * k)))
}

/// First face to calibrate against: right, then left, then behind.
fn calibration_direction(map: &GridMap, pose: Pose) -> Option<Direction> {
    let facing = pose.direction;
    [facing.clockwise(), facing.counter_clockwise(), facing.opposite()]
        .into_iter()
        .find(|&d| can_calibrate_facing(map, pose.coord(), d))
}
