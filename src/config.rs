use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub settings_path: PathBuf,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let root = if args.len() > 1 {
            PathBuf::from(&args[1])
        } else {
            match std::env::var("MEADOW_ROOT") {
                Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
                _ => return Err("usage: meadow <data-root> [settings.yaml]".to_string()),
            }
        };
        let settings_path = if args.len() > 2 {
            PathBuf::from(&args[2])
        } else {
            std::env::var("MEADOW_SETTINGS")
                .ok()
                .and_then(|value| {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(PathBuf::from(trimmed))
                    }
                })
                .unwrap_or_else(|| root.join("settings.yaml"))
        };
        Ok(Self {
            root,
            settings_path,
        })
    }
}

/// Operator-editable settings, loaded from `settings.yaml`. Every field
/// has a default so a missing file runs with stock values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Simulated hours advanced per real hour.
    pub time_scale: f64,
    /// Cooldown between house save/load operations on one map.
    pub map_load_save_timeout_secs: u64,
    /// Idle threshold for the player listing.
    pub afk_timeout_secs: u64,
    /// Eternal day/night re-assertion period.
    pub time_cycle_interval_ms: u64,
    /// Zero disables autosaving.
    pub autosave_interval_secs: u64,
    pub snapshot_cache_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            time_scale: 24.0,
            map_load_save_timeout_secs: 15,
            afk_timeout_secs: 300,
            time_cycle_interval_ms: 2500,
            autosave_interval_secs: 300,
            snapshot_cache_size: 16,
        }
    }
}

impl ServerSettings {
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ServerSettings::default())
            }
            Err(err) => {
                return Err(format!(
                    "settings read failed for {}: {}",
                    path.display(),
                    err
                ))
            }
        };
        serde_yaml::from_str(&data)
            .map_err(|err| format!("settings parse failed for {}: {}", path.display(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_take_precedence() {
        let args = vec![
            "meadow".to_string(),
            "/data".to_string(),
            "/etc/meadow.yaml".to_string(),
        ];
        let config = AppConfig::from_args(&args).expect("config");
        assert_eq!(config.root, PathBuf::from("/data"));
        assert_eq!(config.settings_path, PathBuf::from("/etc/meadow.yaml"));
    }

    #[test]
    fn settings_path_defaults_under_root() {
        let args = vec!["meadow".to_string(), "/data".to_string()];
        let config = AppConfig::from_args(&args).expect("config");
        assert_eq!(config.settings_path, PathBuf::from("/data/settings.yaml"));
    }

    #[test]
    fn missing_settings_file_uses_defaults() {
        let settings =
            ServerSettings::load(Path::new("/nonexistent/settings.yaml")).expect("defaults");
        assert_eq!(settings.map_load_save_timeout_secs, 15);
        assert_eq!(settings.time_cycle_interval_ms, 2500);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let settings: ServerSettings =
            serde_yaml::from_str("time_scale: 48.0\n").expect("parse");
        assert_eq!(settings.time_scale, 48.0);
        assert_eq!(settings.afk_timeout_secs, 300);
    }
}
