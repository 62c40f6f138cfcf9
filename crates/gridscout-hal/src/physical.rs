//! Hardware backend.
//!
//! Every move is relayed to the microcontroller as an instruction frame and
//! mirrored to the app as a pose frame.  Sensing waits for the
//! microcontroller's `SDATA` report, fuses it with
//! [`Sensor::sense_real`], and pushes the updated map descriptor to the app.

use async_trait::async_trait;
use gridscout_middleware::{MessagingBridge, OutboundMessage};
use gridscout_perception::{GridMap, MapDescriptor, Sensor};
use gridscout_types::{Movement, Pose, ScoutError, SensorReadings};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{DriveBackend, DriveMode};

pub struct PhysicalBackend {
    bridge: MessagingBridge,
}

impl PhysicalBackend {
    pub fn new(bridge: MessagingBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl DriveBackend for PhysicalBackend {
    fn mode(&self) -> DriveMode {
        DriveMode::Physical
    }

    async fn execute(&mut self, movement: Movement, pose: Pose) -> Result<(), ScoutError> {
        self.bridge
            .send(&OutboundMessage::Instruction(movement))
            .await?;
        if movement != Movement::Calibrate {
            self.bridge.send(&OutboundMessage::Pose(pose)).await?;
        }
        Ok(())
    }

    async fn execute_forward_run(&mut self, count: usize, pose: Pose) -> Result<(), ScoutError> {
        self.bridge.send(&OutboundMessage::ForwardRun(count)).await?;
        self.bridge
            .send(&OutboundMessage::ForwardRunTelemetry {
                count,
                direction: pose.direction,
            })
            .await?;
        Ok(())
    }

    async fn sense(
        &mut self,
        sensors: &[Sensor; 6],
        discovered: &mut GridMap,
        deadline: Instant,
    ) -> Result<SensorReadings, ScoutError> {
        let readings = self.bridge.recv_sensor_data(deadline).await?;
        for (sensor, reading) in sensors.iter().zip(readings) {
            sensor.sense_real(discovered, reading);
        }
        debug!(?readings, "fused hardware readings");

        let descriptor = MapDescriptor::from_map(discovered);
        let message = OutboundMessage::MapDescriptor {
            part1: descriptor.part1,
            part2: descriptor.part2,
        };
        if let Err(err) = self.bridge.send(&message).await {
            warn!(error = %err, "failed to push map descriptor");
        }
        Ok(readings)
    }

    fn bridge_mut(&mut self) -> Option<&mut MessagingBridge> {
        Some(&mut self.bridge)
    }

    async fn shutdown(&mut self) -> Result<(), ScoutError> {
        self.bridge.close().await?;
        Ok(())
    }
}
