//! `ovpnadm init [--status-log <path>] [--poll-interval <secs>] [--prefix <p>]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use ovpn_core::{config, paths, Config};

use super::home_dir;

/// Write the engine configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Status file written by the VPN server.
    #[arg(long, value_name = "PATH")]
    pub status_log: Option<PathBuf>,

    /// Seconds between scheduled reconciliation cycles.
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Seconds one cycle may run before the daemon gives up on it.
    #[arg(long, value_name = "SECS")]
    pub cycle_timeout: Option<u64>,

    /// Directory store location (default ~/.ovpnadm/directory.yaml).
    #[arg(long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Common-name prefix stripped when deriving usernames.
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Replace an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let existing = paths::config_path_at(&home);
        if existing.exists() && !self.force {
            bail!(
                "{} already exists; pass --force to overwrite",
                existing.display()
            );
        }

        let config = self.into_config();
        config.validate().context("invalid configuration")?;
        let path = config::save_at(&home, &config)
            .with_context(|| format!("failed to write {}", existing.display()))?;

        println!("✓ Wrote {}", path.display());
        println!("  status log:    {}", config.status_log.display());
        println!("  poll interval: {}s", config.poll_interval_secs);
        println!(
            "  directory:     {}",
            config.directory_path_at(&home).display()
        );
        Ok(())
    }

    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            status_log: self.status_log.unwrap_or(defaults.status_log),
            poll_interval_secs: self.poll_interval.unwrap_or(defaults.poll_interval_secs),
            cycle_timeout_secs: self.cycle_timeout.unwrap_or(defaults.cycle_timeout_secs),
            directory: self.directory,
            common_name_prefix: self.prefix,
        }
    }
}
