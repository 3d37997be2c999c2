pub mod clients;
pub mod daemon;
pub mod init;
pub mod sessions;
pub mod sync;
pub mod users;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use ovpn_core::{config, paths, Config};

/// Per-invocation overrides layered on top of `config.yaml`.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Status file to read instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub status_log: Option<PathBuf>,

    /// Common-name prefix stripped when deriving usernames.
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(path) = self.status_log {
            config.status_log = path;
        }
        if let Some(prefix) = self.prefix {
            config.common_name_prefix = Some(prefix);
        }
        config
    }
}

pub fn home_dir() -> Result<PathBuf> {
    Ok(paths::home()?)
}

/// Home directory plus the effective configuration.
pub fn load_config(overrides: ConfigOverrides) -> Result<(PathBuf, Config)> {
    let home = home_dir()?;
    let config = config::load_at(&home).context("failed to load ~/.ovpnadm/config.yaml")?;
    let config = overrides.apply(config);
    config.validate().context("invalid configuration")?;
    Ok((home, config))
}

pub fn format_time(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// `1h 02m 03s`, `4m 05s`, `9s`
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}
