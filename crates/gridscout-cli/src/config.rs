//! Configuration vault – reads/writes `~/.gridscout/config.toml`.

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gridscout_hal::SensorRanges;
use gridscout_kernel::GoalVisitPolicy;
use gridscout_middleware::BridgeConfig;
use gridscout_runtime::telemetry::LogFormat;
use gridscout_runtime::{CalibrationConfig, ExplorerConfig};
use gridscout_types::ScoutError;
use serde::{Deserialize, Serialize};

/// Persisted settings.  Every field has a default, so a partial file is
/// valid.  Table-valued fields stay last so the TOML output stays flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Robot-side bridge host.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Outbound frame rate; `0` sends as fast as the link allows.
    #[serde(default = "default_frames_per_second")]
    pub frames_per_second: u32,

    /// Longest wait for one sensor reading.
    #[serde(default = "default_sensor_timeout_secs")]
    pub sensor_timeout_secs: u64,

    #[serde(default = "default_coverage_limit")]
    pub coverage_limit: usize,

    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,

    /// Simulated time per movement step.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub goal_visit: GoalVisitPolicy,

    #[serde(default)]
    pub sensor_ranges: SensorRanges,
}

fn default_host() -> String {
    "192.168.26.1".to_string()
}
fn default_port() -> u16 {
    2626
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_frames_per_second() -> u32 {
    2
}
fn default_sensor_timeout_secs() -> u64 {
    5
}
fn default_coverage_limit() -> usize {
    300
}
fn default_time_limit_secs() -> u64 {
    360
}
fn default_step_delay_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            frames_per_second: default_frames_per_second(),
            sensor_timeout_secs: default_sensor_timeout_secs(),
            coverage_limit: default_coverage_limit(),
            time_limit_secs: default_time_limit_secs(),
            step_delay_ms: default_step_delay_ms(),
            log_format: LogFormat::default(),
            calibration: CalibrationConfig::default(),
            goal_visit: GoalVisitPolicy::default(),
            sensor_ranges: SensorRanges::default(),
        }
    }
}

impl Config {
    pub fn explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            coverage_limit: self.coverage_limit,
            time_limit: Duration::from_secs(self.time_limit_secs),
            goal_visit: self.goal_visit,
            calibration: self.calibration,
            ..ExplorerConfig::default()
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            host: self.host.clone(),
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            frames_per_second: NonZeroU32::new(self.frames_per_second),
        }
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_secs(self.sensor_timeout_secs)
    }
}

/// Return the path to `~/.gridscout/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gridscout").join("config.toml")
}

/// Load the config from `path` and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, ScoutError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        ScoutError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| ScoutError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load from `path`, falling back to defaults (still with environment
/// overrides) when the file is missing.
pub fn load_or_default(path: &Path) -> Result<Config, ScoutError> {
    Ok(match load_from(path)? {
        Some(cfg) => cfg,
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    })
}

/// Apply `GRIDSCOUT_*` environment variable overrides to `cfg`.
/// Unparseable numbers are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `GRIDSCOUT_HOST` | `host` |
/// | `GRIDSCOUT_PORT` | `port` |
/// | `GRIDSCOUT_TIME_LIMIT` | `time_limit_secs` |
/// | `GRIDSCOUT_COVERAGE_LIMIT` | `coverage_limit` |
/// | `GRIDSCOUT_STEP_DELAY_MS` | `step_delay_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("GRIDSCOUT_HOST") {
        cfg.host = v;
    }
    override_parsed("GRIDSCOUT_PORT", &mut cfg.port);
    override_parsed("GRIDSCOUT_TIME_LIMIT", &mut cfg.time_limit_secs);
    override_parsed("GRIDSCOUT_COVERAGE_LIMIT", &mut cfg.coverage_limit);
    override_parsed("GRIDSCOUT_STEP_DELAY_MS", &mut cfg.step_delay_ms);
}

fn override_parsed<T: std::str::FromStr>(var: &str, field: &mut T) {
    if let Some(v) = std::env::var(var).ok().and_then(|v| v.trim().parse().ok()) {
        *field = v;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ScoutError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ScoutError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                ScoutError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| ScoutError::Config(format!("failed to serialize config: {e}")))?;
    let write_err = |e: std::io::Error| {
        ScoutError::Config(format!("failed to write {}: {e}", path.display()))
    };
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
