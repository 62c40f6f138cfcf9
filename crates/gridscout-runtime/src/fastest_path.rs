//! [`FastestPath`] – A* route planning over (cell, facing) states.
//!
//! Cost model: 10 per forward step, 20 per quarter turn.  The heuristic is
//! the Manhattan distance times the forward cost, which never overestimates.
//! Ties are broken on the heuristic, then on insertion order, so the same
//! map always yields the same plan.
//!
//! A footprint centre is traversable when it is explored, not an obstacle,
//! and not a virtual wall on the map being planned over.
//!
//! Two ways to drive a plan:
//!
//! | Entry point | Sensing | Forward moves |
//! |---|---|---|
//! | [`PathFinder::route`] | after every move, re-plans when blocked | one cell at a time |
//! | [`FastestPath::run_compressed`] | none | batched runs of up to 26 cells |

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use async_trait::async_trait;
use gridscout_hal::Robot;
use gridscout_kernel::{MoveIntent, MoveVerifier};
use gridscout_perception::GridMap;
use gridscout_types::{GridCoord, Movement, Pose, ScoutError};
use tracing::{debug, info, warn};

use crate::path_finder::{PathFinder, RouteOutcome, RouteRequest};

pub const FORWARD_COST: u32 = 10;
pub const TURN_COST: u32 = 20;

/// Re-plans tolerated per route before giving up.
pub const DEFAULT_MAX_REPLANS: usize = 16;

// ────────────────────────────────────────────────────────────────────────────
// Planning
// ────────────────────────────────────────────────────────────────────────────

struct Node {
    pose: Pose,
    g: u32,
    parent: Option<usize>,
    via: Option<Movement>,
}

fn heuristic(from: GridCoord, goal: GridCoord) -> u32 {
    from.manhattan(goal) * FORWARD_COST
}

/// Cheapest primitive sequence taking `from` to `goal` on `map`, arriving
/// with any facing.  `None` when the goal is not traversable or cannot be
/// reached.
pub fn plan(map: &GridMap, from: Pose, goal: GridCoord) -> Option<Vec<Movement>> {
    if from.coord() == goal {
        return Some(Vec::new());
    }
    if !map.is_traversable_center(goal) {
        return None;
    }

    let mut nodes = vec![Node {
        pose: from,
        g: 0,
        parent: None,
        via: None,
    }];
    let mut best: HashMap<Pose, u32> = HashMap::from([(from, 0)]);
    let mut open = BinaryHeap::new();
    let h = heuristic(from.coord(), goal);
    open.push(Reverse((h, h, 0usize)));

    while let Some(Reverse((_, _, idx))) = open.pop() {
        let (pose, g) = (nodes[idx].pose, nodes[idx].g);
        if best.get(&pose).is_some_and(|&b| b < g) {
            continue;
        }
        if pose.coord() == goal {
            return Some(reconstruct(&nodes, idx));
        }
        for (movement, cost) in [
            (Movement::Forward, FORWARD_COST),
            (Movement::TurnRight, TURN_COST),
            (Movement::TurnLeft, TURN_COST),
        ] {
            let next = pose.after(movement);
            if movement == Movement::Forward && !map.is_traversable_center(next.coord()) {
                continue;
            }
            let g_next = g + cost;
            if best.get(&next).is_some_and(|&b| b <= g_next) {
                continue;
            }
            best.insert(next, g_next);
            let h = heuristic(next.coord(), goal);
            nodes.push(Node {
                pose: next,
                g: g_next,
                parent: Some(idx),
                via: Some(movement),
            });
            open.push(Reverse((g_next + h, h, nodes.len() - 1)));
        }
    }
    None
}

fn reconstruct(nodes: &[Node], mut idx: usize) -> Vec<Movement> {
    let mut moves = Vec::new();
    while let (Some(parent), Some(via)) = (nodes[idx].parent, nodes[idx].via) {
        moves.push(via);
        idx = parent;
    }
    moves.reverse();
    moves
}

/// Total cost of a primitive sequence under the planner's cost model.
pub fn plan_cost(moves: &[Movement]) -> u32 {
    moves
        .iter()
        .map(|m| if m.is_turn() { TURN_COST } else { FORWARD_COST })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Turn(Movement),
    Forward(usize),
}

/// Collapse consecutive forward moves into runs.
fn compress(moves: &[Movement]) -> Vec<Step> {
    let mut steps = Vec::new();
    for &m in moves {
        if m != Movement::Forward {
            steps.push(Step::Turn(m));
            continue;
        }
        if let Some(Step::Forward(n)) = steps.last_mut() {
            *n += 1;
        } else {
            steps.push(Step::Forward(1));
        }
    }
    steps
}

// ────────────────────────────────────────────────────────────────────────────
// FastestPath
// ────────────────────────────────────────────────────────────────────────────

enum Progress {
    Completed,
    Blocked,
    Expired,
}

pub struct FastestPath {
    verifier: MoveVerifier,
    max_replans: usize,
}

impl Default for FastestPath {
    fn default() -> Self {
        Self::new()
    }
}

impl FastestPath {
    pub fn new() -> Self {
        Self {
            verifier: MoveVerifier::standard(),
            max_replans: DEFAULT_MAX_REPLANS,
        }
    }

    /// Plan through every stop in order on `map` and drive the whole
    /// sequence with compressed forward runs.  Nothing is sensed.
    pub async fn run_compressed(
        &self,
        map: &GridMap,
        robot: &mut Robot,
        stops: &[GridCoord],
    ) -> Result<RouteOutcome, ScoutError> {
        let mut pose = robot.pose();
        let mut moves = Vec::new();
        for &stop in stops {
            let Some(leg) = plan(map, pose, stop) else {
                warn!(%stop, "no route to stop");
                return Ok(RouteOutcome::Unreachable);
            };
            pose = leg.iter().fold(pose, |p, &m| p.after(m));
            moves.extend(leg);
        }

        let steps = compress(&moves);
        info!(
            primitives = moves.len(),
            steps = steps.len(),
            cost = plan_cost(&moves),
            "fastest path"
        );
        for step in steps {
            match step {
                Step::Turn(turn) => robot.perform(turn).await?,
                Step::Forward(count) => robot.move_forward_multiple(count).await?,
            }
        }
        Ok(RouteOutcome::Reached)
    }

    fn step_is_clear(&self, map: &GridMap, from: Pose) -> bool {
        let intent = MoveIntent {
            map,
            from,
            movement: Movement::Forward,
        };
        self.verifier.verify(&intent).is_ok()
            && intent
                .destination()
                .is_some_and(|dest| map.is_traversable_center(dest))
    }

    async fn follow(
        &self,
        map: &mut GridMap,
        robot: &mut Robot,
        moves: &[Movement],
        request: &RouteRequest,
    ) -> Result<Progress, ScoutError> {
        for &movement in moves {
            if request.expired() {
                return Ok(Progress::Expired);
            }
            if movement == Movement::Forward && !self.step_is_clear(map, robot.pose()) {
                return Ok(Progress::Blocked);
            }
            robot.perform(movement).await?;
            match robot.sense(map).await {
                Ok(_) => {}
                Err(ScoutError::SensorTimeout) => warn!("sensor data timed out on route"),
                Err(err) => return Err(err),
            }
        }
        Ok(Progress::Completed)
    }
}

#[async_trait]
impl PathFinder for FastestPath {
    async fn route(
        &mut self,
        map: &mut GridMap,
        robot: &mut Robot,
        request: RouteRequest,
    ) -> RouteOutcome {
        let mut replans = 0;
        loop {
            if robot.coord() == request.goal {
                return RouteOutcome::Reached;
            }
            if request.expired() {
                return RouteOutcome::TimedOut;
            }
            let Some(moves) = plan(map, robot.pose(), request.goal) else {
                debug!(goal = %request.goal, "no route");
                return RouteOutcome::Unreachable;
            };
            debug!(goal = %request.goal, moves = moves.len(), "following route");

            match self.follow(map, robot, &moves, &request).await {
                Ok(Progress::Completed) => {}
                Ok(Progress::Blocked) => {
                    replans += 1;
                    if replans > self.max_replans {
                        warn!(goal = %request.goal, replans, "giving up after re-planning");
                        return RouteOutcome::Unreachable;
                    }
                    debug!(goal = %request.goal, replans, "route blocked, re-planning");
                }
                Ok(Progress::Expired) => return RouteOutcome::TimedOut,
                Err(err) => {
                    warn!(goal = %request.goal, error = %err, "route aborted");
                    return RouteOutcome::Unreachable;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use gridscout_hal::SimulatedBackend;
    use gridscout_perception::ArenaGeometry;
    use gridscout_types::Direction;
    use tokio::time::Instant;

    fn open_map() -> GridMap {
        let mut map = GridMap::new(ArenaGeometry::default());
        map.mark_all_explored();
        map
    }

    fn sim_robot(pose: Pose, truth: GridMap, step_delay: Duration) -> Robot {
        let goal = truth.goal();
        Robot::new(pose, goal, Box::new(SimulatedBackend::new(truth, step_delay)))
    }

    fn end_pose(from: Pose, moves: &[Movement]) -> Pose {
        moves.iter().fold(from, |p, &m| p.after(m))
    }

    #[test]
    fn straight_line_needs_no_turns() {
        let map = open_map();
        let moves = plan(&map, Pose::new(1, 1, Direction::North), GridCoord::new(6, 1)).unwrap();
        assert_eq!(moves, vec![Movement::Forward; 5]);
    }

    #[test]
    fn plan_prefers_fewer_turns() {
        let map = open_map();
        let from = Pose::new(1, 1, Direction::North);
        let moves = plan(&map, from, GridCoord::new(18, 13)).unwrap();
        assert_eq!(end_pose(from, &moves).coord(), GridCoord::new(18, 13));
        assert_eq!(moves.iter().filter(|m| m.is_turn()).count(), 1);
        assert_eq!(plan_cost(&moves), 17 * 10 + 12 * 10 + 20);
    }

    #[test]
    fn plan_detours_around_obstacles() {
        let mut map = open_map();
        for col in 0..10 {
            map.set_obstacle(GridCoord::new(8, col), true);
        }
        let from = Pose::new(1, 1, Direction::North);
        let goal = GridCoord::new(12, 1);
        let moves = plan(&map, from, goal).unwrap();
        assert_eq!(end_pose(from, &moves).coord(), goal);

        let mut pose = from;
        for m in moves {
            pose = pose.after(m);
            assert!(map.is_traversable_center(pose.coord()), "{pose:?}");
        }
    }

    #[test]
    fn blocked_or_unknown_goal_has_no_plan() {
        let mut map = open_map();
        for col in 0..15 {
            map.set_obstacle(GridCoord::new(10, col), true);
        }
        let from = Pose::new(1, 1, Direction::North);
        assert!(plan(&map, from, GridCoord::new(15, 5)).is_none());
        assert!(plan(&map, from, GridCoord::new(0, 5)).is_none());

        let mut unknown = GridMap::new(ArenaGeometry::default());
        unknown.mark_start_zone();
        assert!(plan(&unknown, from, GridCoord::new(6, 6)).is_none());
    }

    #[test]
    fn plans_are_deterministic() {
        let map = open_map();
        let from = Pose::new(3, 3, Direction::East);
        let a = plan(&map, from, GridCoord::new(12, 9));
        let b = plan(&map, from, GridCoord::new(12, 9));
        assert_eq!(a, b);
    }

    #[test]
    fn compress_groups_forward_runs() {
        use Movement::*;
        let steps = compress(&[Forward, Forward, TurnRight, Forward, TurnLeft, TurnLeft]);
        assert_eq!(
            steps,
            vec![
                Step::Forward(2),
                Step::Turn(TurnRight),
                Step::Forward(1),
                Step::Turn(TurnLeft),
                Step::Turn(TurnLeft),
            ]
        );
    }

    #[tokio::test]
    async fn route_senses_along_the_way() {
        let truth = open_map();
        let mut discovered = GridMap::new(ArenaGeometry::default());
        discovered.mark_start_zone();
        let mut robot = sim_robot(Pose::new(1, 1, Direction::North), truth, Duration::ZERO);
        robot.sense(&mut discovered).await.unwrap();

        let mut finder = FastestPath::new();
        let outcome = finder
            .route(&mut discovered, &mut robot, RouteRequest::to(GridCoord::new(3, 1)))
            .await;
        assert_eq!(outcome, RouteOutcome::Reached);
        assert_eq!(robot.coord(), GridCoord::new(3, 1));
        assert!(discovered.is_explored(GridCoord::new(6, 1)));
    }

    #[tokio::test]
    async fn route_replans_around_a_fresh_obstacle() {
        let mut truth = open_map();
        truth.set_obstacle(GridCoord::new(6, 1), true);

        // The discovered map believes the whole column is open.
        let mut discovered = open_map();
        let mut robot = sim_robot(Pose::new(1, 1, Direction::North), truth, Duration::ZERO);

        let mut finder = FastestPath::new();
        let goal = GridCoord::new(8, 1);
        let outcome = finder
            .route(&mut discovered, &mut robot, RouteRequest::to(goal))
            .await;
        assert_eq!(outcome, RouteOutcome::Reached);
        assert!(discovered.is_obstacle(GridCoord::new(6, 1)));
        assert_eq!(robot.coord(), goal);
    }

    #[tokio::test(start_paused = true)]
    async fn route_stops_at_the_deadline() {
        let truth = open_map();
        let mut discovered = open_map();
        let mut robot = sim_robot(
            Pose::new(1, 1, Direction::North),
            truth,
            Duration::from_millis(100),
        );

        let mut finder = FastestPath::new();
        let request =
            RouteRequest::to(GridCoord::new(15, 1)).until(Instant::now() + Duration::from_millis(350));
        let outcome = finder.route(&mut discovered, &mut robot, request).await;
        assert_eq!(outcome, RouteOutcome::TimedOut);
        assert!(robot.coord().row < 15);
    }

    #[tokio::test]
    async fn compressed_run_visits_the_waypoint() {
        let map = open_map();
        let mut robot = sim_robot(Pose::new(1, 1, Direction::North), open_map(), Duration::ZERO);
        let finder = FastestPath::new();
        let outcome = finder
            .run_compressed(&map, &mut robot, &[GridCoord::new(5, 8), GridCoord::new(18, 13)])
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Reached);
        assert_eq!(robot.coord(), GridCoord::new(18, 13));
        assert!(robot.touched_goal());
    }

    #[tokio::test]
    async fn compressed_run_reports_unreachable_stop() {
        let mut map = open_map();
        for col in 0..15 {
            map.set_obstacle(GridCoord::new(10, col), true);
        }
        let mut robot = sim_robot(Pose::new(1, 1, Direction::North), open_map(), Duration::ZERO);
        let outcome = FastestPath::new()
            .run_compressed(&map, &mut robot, &[GridCoord::new(18, 13)])
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Unreachable);
        assert_eq!(robot.coord(), GridCoord::new(1, 1));
    }
}
