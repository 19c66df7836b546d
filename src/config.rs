use crate::dispatch::DispatcherSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "core.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("usage: tibia-core <root> [config-file]")]
    Usage,
    #[error("read {path} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path} failed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid {name} '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

/// Tunables of the world core, read from `core.yaml`. Every field has a
/// default, so an empty or missing file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    pub placement_radius: u16,
    pub max_destination_depth: usize,
    pub max_container_depth: usize,
    pub depot_item_limit: u32,
    pub dispatcher_task_expiration_ms: Option<u64>,
    pub slow_task_ms: u64,
    pub run_seconds: Option<u64>,
    pub rng_seed: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            placement_radius: 10,
            max_destination_depth: 16,
            max_container_depth: 16,
            depot_item_limit: 2000,
            dispatcher_task_expiration_ms: None,
            slow_task_ms: 50,
            run_seconds: None,
            rng_seed: None,
        }
    }
}

impl CoreConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(level) = env_value("TIBIA_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(value) = env_value("TIBIA_RUN_SECS") {
            let seconds = value.parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                name: "TIBIA_RUN_SECS",
                value: value.clone(),
            })?;
            self.run_seconds = Some(seconds);
        }
        Ok(())
    }
}

impl From<&CoreConfig> for DispatcherSettings {
    fn from(config: &CoreConfig) -> Self {
        Self {
            task_expiration: config
                .dispatcher_task_expiration_ms
                .map(Duration::from_millis),
            slow_task: Duration::from_millis(config.slow_task_ms),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub core: CoreConfig,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        if args.len() < 2 {
            return Err(ConfigError::Usage);
        }
        let root = Path::new(&args[1]).to_path_buf();
        let config_path = if args.len() > 2 {
            PathBuf::from(&args[2])
        } else {
            root.join(DEFAULT_CONFIG_FILE)
        };
        let mut core = CoreConfig::load(&config_path)?;
        core.apply_env()?;
        Ok(Self {
            root,
            config_path,
            core,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn missing_root_is_a_usage_error() {
        assert!(matches!(
            AppConfig::from_args(&args(&["tibia-core"])),
            Err(ConfigError::Usage)
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_string_lossy().to_string();
        let config = AppConfig::from_args(&args(&["tibia-core", &root])).expect("config");
        assert_eq!(config.config_path, dir.path().join(DEFAULT_CONFIG_FILE));
        assert_eq!(config.core.placement_radius, 10);
        assert_eq!(config.core.depot_item_limit, 2000);
    }

    #[test]
    fn partial_files_keep_the_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "placement_radius: 4\ndispatcher_task_expiration_ms: 250\n")
            .expect("write config");
        let config = CoreConfig::load(&path).expect("config");
        assert_eq!(config.placement_radius, 4);
        assert_eq!(config.max_container_depth, 16);
        let settings = DispatcherSettings::from(&config);
        assert_eq!(settings.task_expiration, Some(Duration::from_millis(250)));
        assert_eq!(settings.slow_task, Duration::from_millis(50));
    }

    #[test]
    fn malformed_files_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "placement_radius: [nope\n").expect("write config");
        assert!(matches!(
            CoreConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
