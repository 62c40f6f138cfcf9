//! In-process simulation backend.
//!
//! Holds the ground-truth arena and emulates execution time with a fixed
//! per-step delay, so the full controller runs headless in tests and CI.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use gridscout_hal::{DriveBackend, DriveMode, SimulatedBackend};
//! use gridscout_perception::{ArenaGeometry, GridMap};
//!
//! let mut truth = GridMap::new(ArenaGeometry::default());
//! truth.mark_all_explored();
//!
//! let backend = SimulatedBackend::new(truth, Duration::ZERO);
//! assert_eq!(backend.mode(), DriveMode::Simulated);
//! assert!(backend.ground_truth().is_some());
//! ```

use std::time::Duration;

use async_trait::async_trait;
use gridscout_perception::{GridMap, Sensor};
use gridscout_types::{Movement, Pose, ScoutError, SensorReadings};
use tokio::time::Instant;
use tracing::trace;

use crate::backend::{DriveBackend, DriveMode};

pub struct SimulatedBackend {
    truth: GridMap,
    step_delay: Duration,
}

impl SimulatedBackend {
    pub fn new(truth: GridMap, step_delay: Duration) -> Self {
        Self { truth, step_delay }
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    async fn pause(&self, steps: u32) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay * steps).await;
        }
    }
}

#[async_trait]
impl DriveBackend for SimulatedBackend {
    fn mode(&self) -> DriveMode {
        DriveMode::Simulated
    }

    async fn execute(&mut self, movement: Movement, pose: Pose) -> Result<(), ScoutError> {
        self.pause(1).await;
        trace!(%movement, row = pose.row, col = pose.col, "sim move");
        Ok(())
    }

    async fn execute_forward_run(&mut self, count: usize, _pose: Pose) -> Result<(), ScoutError> {
        self.pause(count as u32).await;
        Ok(())
    }

    async fn sense(
        &mut self,
        sensors: &[Sensor; 6],
        discovered: &mut GridMap,
        _deadline: Instant,
    ) -> Result<SensorReadings, ScoutError> {
        let mut readings: SensorReadings = [None; 6];
        for (slot, sensor) in readings.iter_mut().zip(sensors) {
            *slot = sensor.sense(discovered, &self.truth);
        }
        Ok(readings)
    }

    fn ground_truth(&self) -> Option<&GridMap> {
        Some(&self.truth)
    }
}
