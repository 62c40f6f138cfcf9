//! Execution-mode seam.
//!
//! The [`Robot`][crate::robot::Robot] computes its own kinematics; a
//! [`DriveBackend`] only makes the outside world agree with it.  Move and
//! sense code never branches on the mode.

use std::fmt;

use async_trait::async_trait;
use gridscout_middleware::MessagingBridge;
use gridscout_perception::{GridMap, Sensor};
use gridscout_types::{Movement, Pose, ScoutError, SensorReadings};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    Simulated,
    Physical,
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveMode::Simulated => f.write_str("simulated"),
            DriveMode::Physical => f.write_str("physical"),
        }
    }
}

#[async_trait]
pub trait DriveBackend: Send {
    fn mode(&self) -> DriveMode;

    /// Carry out one primitive movement.  `pose` is the pose once the move
    /// has completed.
    async fn execute(&mut self, movement: Movement, pose: Pose) -> Result<(), ScoutError>;

    /// Carry out `count` forward steps as one compressed run ending at `pose`.
    async fn execute_forward_run(&mut self, count: usize, pose: Pose) -> Result<(), ScoutError>;

    /// Take one reading per sensor, in sensor order, and fuse it into
    /// `discovered`.  Must give up by `deadline`.
    async fn sense(
        &mut self,
        sensors: &[Sensor; 6],
        discovered: &mut GridMap,
        deadline: Instant,
    ) -> Result<SensorReadings, ScoutError>;

    /// The arena as it really is, when the backend knows it.
    fn ground_truth(&self) -> Option<&GridMap> {
        None
    }

    /// The messaging bridge, when the backend drives one.
    fn bridge_mut(&mut self) -> Option<&mut MessagingBridge> {
        None
    }

    /// Release any external resources.
    async fn shutdown(&mut self) -> Result<(), ScoutError> {
        Ok(())
    }
}
