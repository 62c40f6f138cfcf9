//! `gridscout` – command line entry point.
//!
//! Subcommands:
//!
//! - `simulate <layout>` – explore a simulated arena loaded from a layout
//!   file, optionally followed by a fastest-path run to the goal.
//! - `physical` – connect to the robot's messaging bridge, explore on
//!   `EX_START`, remember the `WAY_POINT`, and run the fastest path on
//!   `FP_START`.
//! - `init-config` – write `~/.gridscout/config.toml` with default settings.

mod config;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use gridscout_hal::{PhysicalBackend, Robot, SimulatedBackend};
use gridscout_middleware::{InboundMessage, MessagingBridge};
use gridscout_perception::layout::load_layout;
use gridscout_perception::{ArenaGeometry, GridMap, MapDescriptor};
use gridscout_runtime::telemetry::{LogFormat, init_tracing};
use gridscout_runtime::{ExplorationReport, Explorer, FastestPath, RouteOutcome};
use gridscout_types::{Direction, GridCoord, Pose, ScoutError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "gridscout")]
#[command(about = "Exploration controller for a grid-arena robot")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.gridscout/config.toml)
    #[arg(short = 'c', long = "config", global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a simulated arena loaded from a layout file
    Simulate {
        /// One line per row, north row first; 1 or # is an obstacle, 0 or . is free
        layout: PathBuf,

        /// Simulated time per movement step
        #[arg(long, value_name = "MS")]
        step_delay_ms: Option<u64>,

        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,

        #[arg(long, value_name = "CELLS")]
        coverage_limit: Option<usize>,

        /// Drive the fastest path to the goal after exploring
        #[arg(short = 'f', long = "fastest-path")]
        fastest_path: bool,

        /// Pass through this cell on the fastest path (implies --fastest-path)
        #[arg(short = 'w', long, value_name = "ROW,COL", value_parser = parse_coord)]
        waypoint: Option<GridCoord>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect to the robot and serve app commands
    Physical {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,

        #[arg(long, value_name = "CELLS")]
        coverage_limit: Option<usize>,
    },

    /// Write a config file with default settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(short = 'f', long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(config::config_path);

    let mut cfg = match config::load_or_default(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    let _guard = init_tracing("gridscout", LogFormat::from_env_or(cfg.log_format));

    let result = match cli.command {
        Commands::Simulate {
            layout,
            step_delay_ms,
            time_limit,
            coverage_limit,
            fastest_path,
            waypoint,
            json,
        } => {
            override_limits(&mut cfg, time_limit, coverage_limit);
            if let Some(ms) = step_delay_ms {
                cfg.step_delay_ms = ms;
            }
            let run_fastest = fastest_path || waypoint.is_some();
            simulate(&cfg, &layout, run_fastest.then_some(waypoint), json).await
        }
        Commands::Physical {
            host,
            port,
            time_limit,
            coverage_limit,
        } => {
            override_limits(&mut cfg, time_limit, coverage_limit);
            if let Some(host) = host {
                cfg.host = host;
            }
            if let Some(port) = port {
                cfg.port = port;
            }
            physical(&cfg).await
        }
        Commands::InitConfig { force } => init_config(&path, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn override_limits(cfg: &mut Config, time_limit: Option<u64>, coverage_limit: Option<usize>) {
    if let Some(secs) = time_limit {
        cfg.time_limit_secs = secs;
    }
    if let Some(cells) = coverage_limit {
        cfg.coverage_limit = cells;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// simulate
// ────────────────────────────────────────────────────────────────────────────

/// `fastest` is `Some(waypoint)` when a fastest-path run should follow.
async fn simulate(
    cfg: &Config,
    layout: &Path,
    fastest: Option<Option<GridCoord>>,
    json: bool,
) -> Result<(), ScoutError> {
    let truth = load_layout(layout)?;
    info!(
        layout = %layout.display(),
        rows = truth.rows(),
        cols = truth.cols(),
        step_delay_ms = cfg.step_delay_ms,
        "simulated arena loaded"
    );

    let geometry = truth.geometry();
    let robot = Robot::new(
        start_pose(geometry),
        geometry.goal,
        Box::new(SimulatedBackend::new(truth, cfg.step_delay())),
    )
    .with_ranges(cfg.sensor_ranges);

    let mut explorer = Explorer::new(
        GridMap::new(geometry),
        robot,
        Box::new(FastestPath::new()),
        cfg.explorer_config(),
    );
    let report = explorer.run_exploration().await;
    print_report(&report, json);

    let (map, mut robot) = explorer.into_parts();
    if !json {
        println!("\n{map}");
        println!("  {} {}", "Map descriptor:".bold(), MapDescriptor::from_map(&map));
    }

    if let Some(waypoint) = fastest {
        let outcome = run_fastest_path(&map, &mut robot, waypoint).await?;
        print_fastest_path(outcome, &robot);
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// physical
// ────────────────────────────────────────────────────────────────────────────

async fn physical(cfg: &Config) -> Result<(), ScoutError> {
    let bridge_config = cfg.bridge_config();
    print!(
        "\n  Connecting to {}:{} … ",
        bridge_config.host.dimmed(),
        bridge_config.port
    );
    std::io::stdout().flush().ok();
    let bridge = match MessagingBridge::connect(&bridge_config).await {
        Ok(bridge) => {
            println!("{}", "connected".green());
            bridge
        }
        Err(e) => {
            println!("{}", "failed".red());
            return Err(e.into());
        }
    };

    let geometry = ArenaGeometry::default();
    let robot = Robot::new(
        start_pose(geometry),
        geometry.goal,
        Box::new(PhysicalBackend::new(bridge)),
    )
    .with_ranges(cfg.sensor_ranges)
    .with_sensor_timeout(cfg.sensor_timeout());

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – abandoning the session …".yellow().bold());
        let _ = stop_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will terminate without cleanup");
    }

    tokio::select! {
        result = serve_app(robot, cfg, geometry) => result,
        _ = stopped(stop_rx) => Ok(()),
    }
}

/// Resolves once the Ctrl-C handler fires.  Never resolves when the handler
/// could not be installed.
async fn stopped(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Explore on `EX_START`, then run the fastest path on `FP_START`.
/// A `WAY_POINT` may arrive at any time before `FP_START`.
async fn serve_app(
    mut robot: Robot,
    cfg: &Config,
    geometry: ArenaGeometry,
) -> Result<(), ScoutError> {
    let mut waypoint = None;

    println!("  Waiting for {} …", "EX_START".bold());
    loop {
        match recv(&mut robot).await? {
            InboundMessage::ExplorationStart => break,
            InboundMessage::Waypoint(coord) => {
                info!(%coord, "waypoint set");
                waypoint = Some(coord);
            }
            other => debug!(?other, "ignored while idle"),
        }
    }

    let mut explorer = Explorer::new(
        GridMap::new(geometry),
        robot,
        Box::new(FastestPath::new()),
        cfg.explorer_config(),
    );
    let report = explorer.run_exploration().await;
    print_report(&report, false);
    let (map, mut robot) = explorer.into_parts();

    println!("  Waiting for {} …", "FP_START".bold());
    loop {
        match recv(&mut robot).await? {
            InboundMessage::FastestPathStart => break,
            InboundMessage::Waypoint(coord) => {
                info!(%coord, "waypoint set");
                waypoint = Some(coord);
            }
            other => debug!(?other, "ignored while waiting for FP_START"),
        }
    }

    let outcome = run_fastest_path(&map, &mut robot, waypoint).await?;
    print_fastest_path(outcome, &robot);
    robot.shutdown().await
}

async fn recv(robot: &mut Robot) -> Result<InboundMessage, ScoutError> {
    let bridge = robot
        .bridge_mut()
        .ok_or_else(|| ScoutError::Bridge("robot has no messaging bridge".to_string()))?;
    Ok(bridge.recv().await?)
}

// ────────────────────────────────────────────────────────────────────────────
// init-config
// ────────────────────────────────────────────────────────────────────────────

fn init_config(path: &Path, force: bool) -> Result<(), ScoutError> {
    if path.exists() && !force {
        return Err(ScoutError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config::save_to(&Config::default(), path)?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn start_pose(geometry: ArenaGeometry) -> Pose {
    Pose::new(geometry.start.row, geometry.start.col, Direction::North)
}

/// Fastest path from the robot's pose to the goal, through `waypoint` when
/// it is a traversable cell of `map`.
async fn run_fastest_path(
    map: &GridMap,
    robot: &mut Robot,
    waypoint: Option<GridCoord>,
) -> Result<RouteOutcome, ScoutError> {
    let mut stops = Vec::with_capacity(2);
    match waypoint {
        Some(wp) if map.is_traversable_center(wp) => stops.push(wp),
        Some(wp) => warn!(%wp, "waypoint is not traversable, ignoring it"),
        None => {}
    }
    stops.push(map.goal());
    FastestPath::new().run_compressed(map, robot, &stops).await
}

fn parse_coord(s: &str) -> Result<GridCoord, String> {
    let (row, col) = s
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL, got '{s}'"))?;
    let row = row.trim().parse().map_err(|e| format!("bad row '{row}': {e}"))?;
    let col = col.trim().parse().map_err(|e| format!("bad column '{col}': {e}"))?;
    Ok(GridCoord::new(row, col))
}

fn print_report(report: &ExplorationReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(s) => println!("{s}"),
            Err(e) => warn!(error = %e, "could not serialise report"),
        }
        return;
    }
    let goal = if report.touched_goal {
        "touched".green()
    } else {
        "not touched".yellow()
    };
    println!();
    println!("  {} {}", "Session".bold(), report.session_id.to_string().dimmed());
    println!("  Stopped:   {}", report.stop_reason);
    println!(
        "  Coverage:  {} ({} / {} cells)",
        format!("{:.2}%", report.coverage_percent).bold(),
        report.explored,
        report.total
    );
    println!("  Elapsed:   {:.1}s", report.elapsed_secs);
    println!("  Goal:      {goal}");
    println!(
        "  Final:     ({}, {}) facing {}",
        report.final_pose.row, report.final_pose.col, report.final_pose.direction
    );
}

fn print_fastest_path(outcome: RouteOutcome, robot: &Robot) {
    match outcome {
        RouteOutcome::Reached => println!(
            "  {} Fastest path reached ({}, {})",
            "✓".green().bold(),
            robot.pose().row,
            robot.pose().col
        ),
        other => println!("  {} Fastest path: {other:?}", "✗".red().bold()),
    }
}
