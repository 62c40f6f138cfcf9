//! Route contract between the exploration controller and a path finder.
//!
//! A [`PathFinder`] drives the robot itself: on [`RouteOutcome::Reached`] the
//! moves have already been executed and every move was followed by a sense
//! cycle, so the discovered map reflects the trip.

use async_trait::async_trait;
use gridscout_hal::Robot;
use gridscout_perception::GridMap;
use gridscout_types::GridCoord;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRequest {
    pub goal: GridCoord,
    /// Give up once this instant has passed.
    pub deadline: Option<Instant>,
}

impl RouteRequest {
    pub fn to(goal: GridCoord) -> Self {
        Self {
            goal,
            deadline: None,
        }
    }

    pub fn until(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() > d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteOutcome {
    Reached,
    Unreachable,
    TimedOut,
}

#[async_trait]
pub trait PathFinder: Send {
    async fn route(
        &mut self,
        map: &mut GridMap,
        robot: &mut Robot,
        request: RouteRequest,
    ) -> RouteOutcome;
}
