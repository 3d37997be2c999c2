//! Engine configuration, `~/.ovpnadm/config.yaml`.
//!
//! Every field has a default, so a partial file (or no file at all) is
//! valid. The CLI overrides individual values after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};
use crate::paths;

pub const DEFAULT_STATUS_LOG: &str = "/var/log/openvpn/openvpn-status.log";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Status file written by the VPN server.
    pub status_log: PathBuf,
    pub poll_interval_secs: u64,
    /// Deadline for one reconciliation cycle, store calls included.
    pub cycle_timeout_secs: u64,
    /// Directory store location; `None` means `~/.ovpnadm/directory.yaml`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Fixed prefix stripped from common names to derive usernames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name_prefix: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            status_log: PathBuf::from(DEFAULT_STATUS_LOG),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            cycle_timeout_secs: DEFAULT_CYCLE_TIMEOUT_SECS,
            directory: None,
            common_name_prefix: None,
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    /// Resolved directory store path.
    pub fn directory_path_at(&self, home: &Path) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| paths::directory_path_at(home))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.cycle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "cycle_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.status_log.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("status_log must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Load `<home>/.ovpnadm/config.yaml`, falling back to defaults when absent.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    load_from(&paths::config_path_at(home))
}

/// Load an explicit config file. Missing file → defaults; malformed → `Parse`.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Atomically write `config` to `<home>/.ovpnadm/config.yaml`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let path = paths::config_path_at(home);
    let dir = paths::root_at(home);
    std::fs::create_dir_all(&dir).map_err(|e| config_io_err(&dir, e))?;

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| config_io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| config_io_err(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().unwrap();
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let home = TempDir::new().unwrap();
        let path = paths::config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "status_log: /tmp/status.log\npoll_interval_secs: 5\n").unwrap();

        let config = load_at(home.path()).expect("load");
        assert_eq!(config.status_log, PathBuf::from("/tmp/status.log"));
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.cycle_timeout_secs, DEFAULT_CYCLE_TIMEOUT_SECS);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let home = TempDir::new().unwrap();
        let path = paths::config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "poll_interval_secs: 0\n").unwrap();

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
    }

    #[test]
    fn save_then_load_roundtrip() {
        let home = TempDir::new().unwrap();
        let config = Config {
            common_name_prefix: Some("vpn-".to_string()),
            ..Config::default()
        };
        let path = save_at(home.path(), &config).expect("save");
        assert!(!path.with_extension("yaml.tmp").exists());
        assert_eq!(load_at(home.path()).expect("load"), config);
    }

    #[test]
    fn directory_path_defaults_under_home() {
        let home = TempDir::new().unwrap();
        let config = Config::default();
        assert_eq!(
            config.directory_path_at(home.path()),
            paths::directory_path_at(home.path())
        );
    }
}
