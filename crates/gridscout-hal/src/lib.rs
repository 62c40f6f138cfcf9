//! `gridscout-hal` – the robot body.
//!
//! [`Robot`][robot::Robot] owns the pose, the six proximity sensors and the
//! move/sense state machine.  How a move or a sense is actually carried out is
//! delegated to a [`DriveBackend`][backend::DriveBackend] chosen once at
//! construction:
//!
//! | Backend | Moves | Sensing |
//! |---|---|---|
//! | [`SimulatedBackend`][sim::SimulatedBackend] | sleep for the step delay | ray-march the ground-truth arena |
//! | [`PhysicalBackend`][physical::PhysicalBackend] | instruction + pose frames over the bridge | wait for `SDATA`, push the map descriptor |

pub mod backend;
pub mod physical;
pub mod robot;
pub mod sim;

pub use backend::{DriveBackend, DriveMode};
pub use physical::PhysicalBackend;
pub use robot::{Robot, RobotState, SensorRanges};
pub use sim::SimulatedBackend;
