//! Configuration file – reads/writes `~/.rover/config.toml`.
//!
//! The file holds the three tables of
//! [`SupervisorConfig`][rover_runtime::SupervisorConfig]:
//!
//! ```toml
//! [stall_detection]
//! queue_size = 100
//! movement_tolerance = 0.1
//!
//! [state_controller]
//! startup_wait_secs = 2.0
//!
//! [supervisor_loop]
//! tick_rate_hz = 10.0
//! ```
//!
//! Any missing key takes its default.

use std::fs;
use std::path::{Path, PathBuf};

use rover_runtime::SupervisorConfig;
use rover_types::RoverError;

/// Return the config path: `$ROVER_CONFIG` when set, else
/// `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ROVER_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<SupervisorConfig>, RoverError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<SupervisorConfig>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        RoverError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| RoverError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_QUEUE_SIZE` | `stall_detection.queue_size` |
/// | `ROVER_LEGACY_STALL_CONDITION` | `stall_detection.legacy_condition_precedence` |
/// | `ROVER_STARTUP_WAIT_TIME` | `state_controller.startup_wait_secs` |
/// | `ROVER_ENABLE_LOGGING` | `enable_logging` of both components |
/// | `ROVER_TICK_RATE_HZ` | `supervisor_loop.tick_rate_hz` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut SupervisorConfig) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut SupervisorConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("ROVER_QUEUE_SIZE")
        && let Ok(n) = v.trim().parse::<usize>()
    {
        cfg.stall_detection.queue_size = n;
    }
    if let Some(v) = var("ROVER_LEGACY_STALL_CONDITION")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.stall_detection.legacy_condition_precedence = flag;
    }
    if let Some(v) = var("ROVER_STARTUP_WAIT_TIME")
        && let Ok(secs) = v.trim().parse::<f64>()
    {
        cfg.state_controller.startup_wait_secs = secs;
    }
    if let Some(v) = var("ROVER_ENABLE_LOGGING")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.stall_detection.enable_logging = flag;
        cfg.state_controller.enable_logging = flag;
    }
    if let Some(v) = var("ROVER_TICK_RATE_HZ")
        && let Ok(hz) = v.trim().parse::<f64>()
    {
        cfg.supervisor_loop.tick_rate_hz = hz;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating the parent directory if necessary.
pub fn save(cfg: &SupervisorConfig) -> Result<(), RoverError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &SupervisorConfig, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            RoverError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::Serialization(format!("failed to serialize config: {e}")))?;
    // Owner read/write only (rw-------) on Unix.
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
            .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overridden(vars: &[(&str, &str)]) -> SupervisorConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut cfg = SupervisorConfig::default();
        apply_overrides(&mut cfg, |key| vars.get(key).cloned());
        cfg
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&SupervisorConfig::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, SupervisorConfig::default());
        assert_eq!(loaded.stall_detection.queue_size, 100);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[state_controller]\nstartup_wait_secs = 2.5\n").expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.state_controller.startup_wait_secs, 2.5);
        assert_eq!(loaded.stall_detection, SupervisorConfig::default().stall_detection);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[stall_detection]\nqueue_size = \"lots\"\n").expect("write");

        assert!(matches!(load_from(&path), Err(RoverError::Config(_))));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn config_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&SupervisorConfig::default(), &path).expect("save");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn config_path_points_to_rover_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".rover"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn overrides_apply_to_each_field() {
        let cfg = overridden(&[
            ("ROVER_QUEUE_SIZE", "25"),
            ("ROVER_LEGACY_STALL_CONDITION", "true"),
            ("ROVER_STARTUP_WAIT_TIME", "1.5"),
            ("ROVER_ENABLE_LOGGING", "1"),
            ("ROVER_TICK_RATE_HZ", "20"),
        ]);
        assert_eq!(cfg.stall_detection.queue_size, 25);
        assert!(cfg.stall_detection.legacy_condition_precedence);
        assert_eq!(cfg.state_controller.startup_wait_secs, 1.5);
        assert!(cfg.stall_detection.enable_logging);
        assert!(cfg.state_controller.enable_logging);
        assert_eq!(cfg.supervisor_loop.tick_rate_hz, 20.0);
    }

    #[test]
    fn unparsable_overrides_are_ignored() {
        let cfg = overridden(&[
            ("ROVER_QUEUE_SIZE", "many"),
            ("ROVER_ENABLE_LOGGING", "maybe"),
            ("ROVER_TICK_RATE_HZ", ""),
        ]);
        assert_eq!(cfg, SupervisorConfig::default());
    }
}
