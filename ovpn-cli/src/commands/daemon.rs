//! `ovpnadm daemon`: foreground scheduler and its control socket.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use ovpn_core::paths::socket_path;
use ovpn_daemon::{request_status, request_stop, request_sync, start_blocking, DaemonError};

use super::sync::print_summary;
use super::{home_dir, load_config, print_json, ConfigOverrides};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the scheduler in the foreground (ticker + socket server).
    Start(DaemonStartArgs),
    /// Request graceful daemon shutdown over the control socket.
    Stop,
    /// Query daemon runtime status over the control socket.
    Status,
    /// Ask a running daemon to reconcile now and print the cycle summary.
    Sync,
}

#[derive(Args, Debug)]
pub struct DaemonStartArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Seconds between scheduled cycles.
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start(args) => {
            let (home, mut config) = load_config(args.overrides)?;
            if let Some(secs) = args.poll_interval {
                config.poll_interval_secs = secs;
                config.validate().context("invalid configuration")?;
            }
            start_blocking(&home, config).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => {
            let home = home_dir()?;
            match request_stop(&home) {
                Ok(()) => println!("daemon stop requested"),
                Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
                Err(err) => return Err(err).context("failed to stop daemon"),
            }
        }
        DaemonCommand::Status => {
            let home = home_dir()?;
            match request_status(&home) {
                Ok(status) => print_json(&status)?,
                Err(DaemonError::DaemonNotRunning { .. }) => {
                    print_json(&serde_json::json!({
                        "running": false,
                        "socket": socket_path(&home).display().to_string(),
                    }))?;
                }
                Err(err) => return Err(err).context("failed to query daemon status"),
            }
        }
        DaemonCommand::Sync => {
            let home = home_dir()?;
            let summary = request_sync(&home).context("daemon sync failed")?;
            print_summary(&summary);
        }
    }

    Ok(())
}
