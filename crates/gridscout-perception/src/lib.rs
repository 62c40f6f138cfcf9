//! `gridscout-perception` – the robot's picture of the arena.
//!
//! Turns raw proximity readings into the discovered occupancy grid that the
//! exploration controller and the path finder reason about.
//!
//! # Modules
//!
//! - [`grid`] – [`GridMap`][grid::GridMap]: arena-backed cell storage with
//!   explored / obstacle / virtual-wall flags, start and goal zones, and
//!   bounds checking.
//! - [`sensor`] – [`Sensor`][sensor::Sensor]: a directional proximity probe
//!   that ray-marches either against a ground-truth map (simulation) or from
//!   an externally supplied distance (hardware) and fuses the result into the
//!   discovered map.
//! - [`layout`] – text arena layouts for ground-truth maps.
//! - [`descriptor`] – [`MapDescriptor`][descriptor::MapDescriptor]: the
//!   two-part hex encoding of explored and obstacle flags sent to the app.

pub mod descriptor;
pub mod grid;
pub mod layout;
pub mod sensor;

pub use descriptor::MapDescriptor;
pub use grid::{ArenaGeometry, Cell, GridMap};
pub use layout::MapError;
pub use sensor::{Sensor, SensorRange};
