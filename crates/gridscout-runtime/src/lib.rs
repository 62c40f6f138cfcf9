//! `gridscout-runtime` – the exploration controller and its collaborators.
//!
//! # Modules
//!
//! - [`explorer`] – [`Explorer`][explorer::Explorer]: wall-hugging
//!   exploration, the unexplored-reachability sweep, and the return home.
//! - [`path_finder`] – the [`PathFinder`][path_finder::PathFinder] contract
//!   used for detours and the return leg.
//! - [`fastest_path`] – [`FastestPath`][fastest_path::FastestPath]: A* over
//!   (cell, facing) with sensing during execution, plus the compressed
//!   waypoint run.
//! - [`progress_guard`] – [`ProgressGuard`][progress_guard::ProgressGuard]:
//!   ends exploration when coverage stops growing.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP export.

pub mod explorer;
pub mod fastest_path;
pub mod path_finder;
pub mod progress_guard;
pub mod telemetry;

pub use explorer::{CalibrationConfig, ExplorationReport, Explorer, ExplorerConfig, StopReason};
pub use fastest_path::FastestPath;
pub use path_finder::{PathFinder, RouteOutcome, RouteRequest};
pub use progress_guard::ProgressGuard;
