//! Configuration file – reads/writes `~/.catapult/config.toml`.
//!
//! Every table and field has a default, so a partial (or empty) file is
//! valid. Set `CATAPULT_CONFIG` to use a different path.

use std::fs;
use std::path::{Path, PathBuf};

use catapult_hal::HardwareConfig;
use catapult_runtime::{
    LogFormat, PivotConfig, RobotConfig, SupervisorConfig, TelemetryConfig, WinchConfig,
};
use catapult_types::CatapultError;
use serde::{Deserialize, Serialize};

/// Persisted configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pivot: PivotConfig,
    pub winch: WinchConfig,
    pub hardware: HardwareConfig,
    pub supervisor: SupervisorConfig,
    pub logging: TelemetryConfig,
}

impl Config {
    pub fn robot(&self) -> RobotConfig {
        RobotConfig {
            pivot: self.pivot.clone(),
            winch: self.winch.clone(),
            supervisor: self.supervisor.clone(),
        }
    }
}

/// `$CATAPULT_CONFIG`, or `~/.catapult/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CATAPULT_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".catapult").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, CatapultError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, CatapultError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        CatapultError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| CatapultError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `CATAPULT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CATAPULT_PIVOT_PERIOD_MS` | `pivot.period_ms` |
/// | `CATAPULT_WINCH_PERIOD_MS` | `winch.period_ms` |
/// | `CATAPULT_LOG_FORMAT` | `logging.format` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(ms) = env_parse::<u64>("CATAPULT_PIVOT_PERIOD_MS") {
        cfg.pivot.period_ms = ms;
    }
    if let Some(ms) = env_parse::<u64>("CATAPULT_WINCH_PERIOD_MS") {
        cfg.winch.period_ms = ms;
    }
    if let Some(format) = env_parse::<LogFormat>("CATAPULT_LOG_FORMAT") {
        cfg.logging.format = format;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &Config) -> Result<(), CatapultError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), CatapultError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            CatapultError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| CatapultError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| CatapultError::Config(format!("failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.pivot.acquire_angle, 120.0);
        assert_eq!(loaded.winch.cooldown_ms, 750);
        assert_eq!(loaded.pivot.presets.len(), 3);
        assert_eq!(loaded.logging.filter, "info");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[pivot]
gain_distance = 25.0
presets = [{ name = "wall", angle = 20.0 }]

[hardware]
ball_debounce_ms = 150
"#,
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.pivot.gain_distance, 25.0);
        assert_eq!(cfg.pivot.presets[0].name, "wall");
        assert_eq!(cfg.pivot.acquire_angle, PivotConfig::default().acquire_angle);
        assert_eq!(cfg.hardware.ball_debounce_ms, 150);
        assert_eq!(cfg.winch.max_position, WinchConfig::default().max_position);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pivot\nperiod_ms = ").unwrap();
        assert!(matches!(load_from(&path), Err(CatapultError::Config(_))));
    }

    #[test]
    fn config_path_points_to_catapult_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".catapult"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn apply_env_overrides_changes_periods_and_format() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe {
            std::env::set_var("CATAPULT_WINCH_PERIOD_MS", "5");
            std::env::set_var("CATAPULT_LOG_FORMAT", "json");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.winch.period_ms, 5);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        unsafe {
            std::env::remove_var("CATAPULT_WINCH_PERIOD_MS");
            std::env::remove_var("CATAPULT_LOG_FORMAT");
        }
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_period() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("CATAPULT_PIVOT_PERIOD_MS", "fast") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.pivot.period_ms, PivotConfig::default().period_ms);
        unsafe { std::env::remove_var("CATAPULT_PIVOT_PERIOD_MS") };
    }

    #[test]
    fn robot_config_carries_subsystem_tables() {
        let mut cfg = Config::default();
        cfg.pivot.period_ms = 15;
        cfg.supervisor.watchdog_factor = 4;
        let robot = cfg.robot();
        assert_eq!(robot.pivot.period_ms, 15);
        assert_eq!(robot.supervisor.watchdog_factor, 4);
    }
}
