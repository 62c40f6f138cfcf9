//! The robot's pose, sensor constellation, and move/sense state machine.
//!
//! The robot occupies a 3×3 footprint; its pose is the centre cell plus a
//! facing.  Six proximity sensors are mounted at fixed offsets relative to
//! that pose and are repositioned after every move:
//!
//! | Sensor | Mount (forward, right) | Looks | Range |
//! |---|---|---|---|
//! | front-left | (1, −1) | ahead | short |
//! | front-centre | (1, 0) | ahead | short |
//! | front-right | (1, 1) | ahead | short |
//! | left-short | (1, −1) | left | short |
//! | right-short | (1, 1) | right | short |
//! | left-long | (0, −1) | left | long |
//!
//! State machine: `Idle → Moving → Idle` for moves and `Idle → Sensing →
//! Idle` for sense cycles, driven only by the caller.

use std::time::Duration;

use gridscout_middleware::{EventBus, MessagingBridge, Topic};
use gridscout_perception::{GridMap, Sensor, SensorRange};
use gridscout_types::{
    Direction, Event, EventPayload, GridCoord, Movement, Pose, ScoutError, SensorId,
    SensorReadings,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::backend::{DriveBackend, DriveMode};

/// Longest forward run sent as a single compressed instruction.
const MAX_RUN: usize = 26;

/// Default bound on a single wait for sensor data.
pub const DEFAULT_SENSOR_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotState {
    Idle,
    Moving,
    Sensing,
}

/// Detection ranges for the short- and long-range sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRanges {
    pub short: SensorRange,
    pub long: SensorRange,
}

impl Default for SensorRanges {
    fn default() -> Self {
        Self {
            short: SensorRange::SHORT,
            long: SensorRange::LONG,
        }
    }
}

#[derive(Clone, Copy)]
enum Look {
    Ahead,
    Left,
    Right,
}

/// (sensor, forward offset, right offset, look, long range?)
const MOUNTS: [(SensorId, i32, i32, Look, bool); 6] = [
    (SensorId::FrontLeft, 1, -1, Look::Ahead, false),
    (SensorId::FrontCenter, 1, 0, Look::Ahead, false),
    (SensorId::FrontRight, 1, 1, Look::Ahead, false),
    (SensorId::LeftShort, 1, -1, Look::Left, false),
    (SensorId::RightShort, 1, 1, Look::Right, false),
    (SensorId::LeftLong, 0, -1, Look::Left, true),
];

pub struct Robot {
    pose: Pose,
    goal: GridCoord,
    ranges: SensorRanges,
    sensors: [Sensor; 6],
    touched_goal: bool,
    state: RobotState,
    sensor_timeout: Duration,
    session_deadline: Option<Instant>,
    backend: Box<dyn DriveBackend>,
    bus: Option<EventBus>,
}

impl Robot {
    pub fn new(pose: Pose, goal: GridCoord, backend: Box<dyn DriveBackend>) -> Self {
        let ranges = SensorRanges::default();
        let mut robot = Self {
            pose,
            goal,
            ranges,
            sensors: mount_sensors(pose, ranges),
            touched_goal: false,
            state: RobotState::Idle,
            sensor_timeout: DEFAULT_SENSOR_TIMEOUT,
            session_deadline: None,
            backend,
            bus: None,
        };
        robot.update_goal_latch();
        robot
    }

    pub fn with_ranges(mut self, ranges: SensorRanges) -> Self {
        self.ranges = ranges;
        self.set_sensors();
        self
    }

    pub fn with_sensor_timeout(mut self, timeout: Duration) -> Self {
        self.sensor_timeout = timeout;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn coord(&self) -> GridCoord {
        self.pose.coord()
    }

    pub fn direction(&self) -> Direction {
        self.pose.direction
    }

    pub fn touched_goal(&self) -> bool {
        self.touched_goal
    }

    pub fn state(&self) -> RobotState {
        self.state
    }

    pub fn sensors(&self) -> &[Sensor; 6] {
        &self.sensors
    }

    pub fn mode(&self) -> DriveMode {
        self.backend.mode()
    }

    pub fn ground_truth(&self) -> Option<&GridMap> {
        self.backend.ground_truth()
    }

    pub fn bridge_mut(&mut self) -> Option<&mut MessagingBridge> {
        self.backend.bridge_mut()
    }

    /// Sensor waits never run past `deadline` while it is still ahead.
    pub fn set_session_deadline(&mut self, deadline: Option<Instant>) {
        self.session_deadline = deadline;
    }

    /// Recompute every sensor's origin and facing from the current pose.
    pub fn set_sensors(&mut self) {
        self.sensors = mount_sensors(self.pose, self.ranges);
    }

    fn update_goal_latch(&mut self) {
        if self.pose.coord() == self.goal {
            self.touched_goal = true;
        }
    }

    // ── Moving ──────────────────────────────────────────────────────────────

    /// Execute one primitive movement.
    pub async fn perform(&mut self, movement: Movement) -> Result<(), ScoutError> {
        let next = self.pose.after(movement);
        self.state = RobotState::Moving;
        let outcome = self.backend.execute(movement, next).await;
        self.state = RobotState::Idle;
        outcome?;

        self.pose = next;
        self.set_sensors();
        self.update_goal_latch();
        debug!(%movement, row = next.row, col = next.col, dir = %next.direction, "moved");
        self.publish_pose();
        Ok(())
    }

    /// Move `count` cells forward.  Runs are sent as compressed instructions
    /// of at most 26 cells; a single cell is a plain forward move.
    pub async fn move_forward_multiple(&mut self, count: usize) -> Result<(), ScoutError> {
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(MAX_RUN);
            if chunk == 1 {
                self.perform(Movement::Forward).await?;
            } else {
                self.forward_run(chunk).await?;
            }
            remaining -= chunk;
        }
        Ok(())
    }

    async fn forward_run(&mut self, count: usize) -> Result<(), ScoutError> {
        let from = self.pose.coord();
        let direction = self.pose.direction;
        let target = from.step(direction, count as i32);
        let end = Pose::new(target.row, target.col, direction);
        let passes_goal = (1..=count as i32).any(|i| from.step(direction, i) == self.goal);

        self.state = RobotState::Moving;
        let outcome = self.backend.execute_forward_run(count, end).await;
        self.state = RobotState::Idle;
        outcome?;

        if passes_goal {
            self.touched_goal = true;
        }
        self.pose = end;
        self.set_sensors();
        debug!(count, row = end.row, col = end.col, "forward run");
        self.publish_pose();
        Ok(())
    }

    // ── Sensing ─────────────────────────────────────────────────────────────

    /// Take one reading from every sensor and fuse it into `discovered`.
    pub async fn sense(&mut self, discovered: &mut GridMap) -> Result<SensorReadings, ScoutError> {
        let now = Instant::now();
        let mut deadline = now + self.sensor_timeout;
        if let Some(session) = self.session_deadline.filter(|d| *d > now) {
            deadline = deadline.min(session);
        }

        self.state = RobotState::Sensing;
        let outcome = self
            .backend
            .sense(&self.sensors, discovered, deadline)
            .await;
        self.state = RobotState::Idle;
        outcome
    }

    pub async fn shutdown(&mut self) -> Result<(), ScoutError> {
        self.backend.shutdown().await
    }

    fn publish_pose(&self) {
        if let Some(bus) = &self.bus {
            bus.publish(
                Topic::Pose,
                Event::new("gridscout-hal::robot", EventPayload::Pose(self.pose)),
            );
        }
    }
}

fn mount_sensors(pose: Pose, ranges: SensorRanges) -> [Sensor; 6] {
    let facing = pose.direction;
    let (fr, fc) = facing.delta();
    let (rr, rc) = facing.clockwise().delta();
    MOUNTS.map(|(id, forward, right, look, long)| {
        let origin = pose
            .coord()
            .offset(fr * forward + rr * right, fc * forward + rc * right);
        let looking = match look {
            Look::Ahead => facing,
            Look::Left => facing.counter_clockwise(),
            Look::Right => facing.clockwise(),
        };
        let range = if long { ranges.long } else { ranges.short };
        Sensor::new(id, range, origin, looking)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::PhysicalBackend;
    use crate::sim::SimulatedBackend;
    use gridscout_middleware::StreamTransport;
    use gridscout_perception::ArenaGeometry;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    const GOAL: GridCoord = GridCoord::new(18, 13);

    fn open_arena() -> GridMap {
        let mut m = GridMap::new(ArenaGeometry::default());
        m.mark_all_explored();
        m
    }

    fn sim_robot(pose: Pose) -> Robot {
        Robot::new(
            pose,
            GOAL,
            Box::new(SimulatedBackend::new(open_arena(), Duration::ZERO)),
        )
    }

    fn physical_robot(pose: Pose) -> (Robot, DuplexStream) {
        let (local, remote) = tokio::io::duplex(4096);
        let bridge = MessagingBridge::new(Box::new(StreamTransport::new(local)));
        let robot = Robot::new(pose, GOAL, Box::new(PhysicalBackend::new(bridge)));
        (robot, remote)
    }

    #[tokio::test]
    async fn four_turns_restore_direction_and_position() {
        for turn in [Movement::TurnLeft, Movement::TurnRight] {
            let mut robot = sim_robot(Pose::new(5, 5, Direction::East));
            for _ in 0..4 {
                robot.perform(turn).await.unwrap();
                assert_eq!(robot.coord(), GridCoord::new(5, 5));
            }
            assert_eq!(robot.direction(), Direction::East);
        }
    }

    #[tokio::test]
    async fn forward_and_backward_follow_the_facing() {
        let mut robot = sim_robot(Pose::new(5, 5, Direction::West));
        robot.perform(Movement::Forward).await.unwrap();
        assert_eq!(robot.coord(), GridCoord::new(5, 4));
        robot.perform(Movement::Backward).await.unwrap();
        robot.perform(Movement::Backward).await.unwrap();
        assert_eq!(robot.coord(), GridCoord::new(5, 6));
        assert_eq!(robot.direction(), Direction::West);
    }

    #[tokio::test]
    async fn calibrate_keeps_pose() {
        let mut robot = sim_robot(Pose::new(3, 3, Direction::South));
        robot.perform(Movement::Calibrate).await.unwrap();
        assert_eq!(robot.pose(), Pose::new(3, 3, Direction::South));
        assert_eq!(robot.state(), RobotState::Idle);
    }

    #[test]
    fn sensors_follow_the_pose() {
        let robot = sim_robot(Pose::new(1, 1, Direction::North));
        let s = robot.sensors();
        assert_eq!(s[0].origin(), GridCoord::new(2, 0));
        assert_eq!(s[0].facing(), Direction::North);
        assert_eq!(s[1].origin(), GridCoord::new(2, 1));
        assert_eq!(s[2].origin(), GridCoord::new(2, 2));
        assert_eq!(s[3].origin(), GridCoord::new(2, 0));
        assert_eq!(s[3].facing(), Direction::West);
        assert_eq!(s[4].origin(), GridCoord::new(2, 2));
        assert_eq!(s[4].facing(), Direction::East);
        assert_eq!(s[5].origin(), GridCoord::new(1, 0));
        assert_eq!(s[5].facing(), Direction::West);
        assert_eq!(s[5].range(), SensorRange::LONG);

        let robot = sim_robot(Pose::new(5, 5, Direction::East));
        let s = robot.sensors();
        assert_eq!(s[0].origin(), GridCoord::new(6, 6));
        assert_eq!(s[2].origin(), GridCoord::new(4, 6));
        assert_eq!(s[3].facing(), Direction::North);
        assert_eq!(s[4].facing(), Direction::South);
        assert_eq!(s[5].origin(), GridCoord::new(6, 5));
    }

    #[test]
    fn custom_ranges_are_applied() {
        let ranges = SensorRanges {
            short: SensorRange::new(1, 3),
            long: SensorRange::new(2, 6),
        };
        let robot = sim_robot(Pose::new(1, 1, Direction::North)).with_ranges(ranges);
        assert_eq!(robot.sensors()[0].range(), SensorRange::new(1, 3));
        assert_eq!(robot.sensors()[5].range(), SensorRange::new(2, 6));
    }

    #[tokio::test]
    async fn multiple_forward_equals_single_steps() {
        for k in [0, 1, 2, 5] {
            let mut batched = sim_robot(Pose::new(1, 13, Direction::North));
            let mut stepped = sim_robot(Pose::new(1, 13, Direction::North));
            batched.move_forward_multiple(k).await.unwrap();
            for _ in 0..k {
                stepped.perform(Movement::Forward).await.unwrap();
            }
            assert_eq!(batched.pose(), stepped.pose(), "k = {k}");
        }
    }

    #[tokio::test]
    async fn goal_latch_survives_leaving_the_goal() {
        let mut robot = sim_robot(Pose::new(15, 13, Direction::North));
        robot.move_forward_multiple(4).await.unwrap();
        assert_eq!(robot.coord(), GridCoord::new(19, 13));
        assert!(robot.touched_goal());

        robot.perform(Movement::Backward).await.unwrap();
        robot.perform(Movement::Backward).await.unwrap();
        assert!(robot.touched_goal());
    }

    #[tokio::test]
    async fn sim_sense_reports_in_sensor_order() {
        let mut robot = sim_robot(Pose::new(1, 1, Direction::North));
        let mut discovered = GridMap::new(ArenaGeometry::default());
        let readings = robot.sense(&mut discovered).await.unwrap();
        // Left-facing sensors sit on column 0 and look straight at the wall.
        assert_eq!(readings, [None, None, None, None, None, None]);
        assert!(discovered.is_explored_free(GridCoord::new(3, 1)));
        assert!(discovered.is_explored_free(GridCoord::new(4, 2)));
        assert!(discovered.is_explored_free(GridCoord::new(2, 4)));
        assert!(!discovered.is_explored(GridCoord::new(2, 5)));
    }

    #[tokio::test]
    async fn physical_moves_emit_frames() -> Result<(), Box<dyn std::error::Error>> {
        let (mut robot, mut remote) = physical_robot(Pose::new(1, 1, Direction::North));
        robot.perform(Movement::Forward).await?;
        robot.perform(Movement::TurnRight).await?;
        robot.perform(Movement::Calibrate).await?;
        robot.move_forward_multiple(30).await?;
        robot.shutdown().await?;

        let mut out = String::new();
        remote.read_to_string(&mut out).await?;
        assert_eq!(
            out,
            "Alg|Ard|F|Alg|And|rp|2|1|N|\
             Alg|Ard|R|Alg|And|rp|2|1|E|\
             Alg|Ard|C|\
             Alg|Ard|Z|Alg|And|fp|26|E|\
             Alg|Ard|D|Alg|And|fp|4|E|"
        );
        assert_eq!(robot.coord(), GridCoord::new(2, 31));
        Ok(())
    }

    #[tokio::test]
    async fn physical_run_of_27_ends_with_a_plain_forward() -> Result<(), Box<dyn std::error::Error>> {
        let (mut robot, mut remote) = physical_robot(Pose::new(1, 1, Direction::North));
        robot.move_forward_multiple(27).await?;
        robot.shutdown().await?;

        let mut out = String::new();
        remote.read_to_string(&mut out).await?;
        assert_eq!(out, "Alg|Ard|Z|Alg|And|fp|26|N|Alg|Ard|F|Alg|And|rp|28|1|N|");
        Ok(())
    }

    #[tokio::test]
    async fn physical_sense_fuses_and_reports_map() -> Result<(), Box<dyn std::error::Error>> {
        let (mut robot, mut remote) = physical_robot(Pose::new(1, 1, Direction::North));
        remote.write_all(b"SDATA|-1, 2, -1, -1, -1, -1\n").await?;

        let mut discovered = GridMap::new(ArenaGeometry::default());
        let readings = robot.sense(&mut discovered).await?;
        assert_eq!(readings[1], Some(2));
        assert!(discovered.is_obstacle(GridCoord::new(4, 1)));
        assert!(discovered.is_explored_free(GridCoord::new(3, 1)));

        robot.shutdown().await?;
        let mut out = String::new();
        remote.read_to_string(&mut out).await?;
        assert!(out.starts_with("Alg|And|md1|"), "{out}");
        assert!(out.contains("|and|And|md2|"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn physical_sense_times_out() {
        let (robot, _remote) = physical_robot(Pose::new(1, 1, Direction::North));
        let mut robot = robot.with_sensor_timeout(Duration::from_secs(2));
        let mut discovered = GridMap::new(ArenaGeometry::default());

        let started = Instant::now();
        let result = robot.sense(&mut discovered).await;
        assert_eq!(result, Err(ScoutError::SensorTimeout));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(robot.state(), RobotState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn session_deadline_shortens_sensor_wait() {
        let (mut robot, _remote) = physical_robot(Pose::new(1, 1, Direction::North));
        robot.set_session_deadline(Some(Instant::now() + Duration::from_millis(500)));
        let mut discovered = GridMap::new(ArenaGeometry::default());

        let started = Instant::now();
        let result = robot.sense(&mut discovered).await;
        assert_eq!(result, Err(ScoutError::SensorTimeout));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn moves_are_published_on_the_bus() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe(Topic::Pose);
        let mut robot = sim_robot(Pose::new(1, 1, Direction::North)).with_bus(bus);
        robot.perform(Movement::Forward).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.payload, EventPayload::Pose(p) if p.row == 2));
    }
}
