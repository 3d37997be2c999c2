//! `ovpnadm sync`: one reconciliation cycle, in this process.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ovpn_sync::{CycleSummary, Pipeline};

use super::{load_config, print_json, ConfigOverrides};

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Print the cycle summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = load_config(self.overrides)?;
        let summary = Pipeline::from_config(&home, &config)
            .run()
            .with_context(|| format!("sync failed for {}", config.status_log.display()))?;

        if self.json {
            return print_json(&summary);
        }
        print_summary(&summary);
        Ok(())
    }
}

pub(crate) fn print_summary(summary: &CycleSummary) {
    let mark = if summary.is_clean() {
        "✓".green()
    } else {
        "!".yellow()
    };
    println!("{mark} {}", summary.headline());

    for name in &summary.confirmed {
        println!("  +  {name}");
    }
    for name in &summary.disconnected {
        println!("  -  {name}");
    }
    for name in &summary.unknown_clients {
        println!("  ?  {name} {}", "(no such user)".dimmed());
    }
    for failure in &summary.failures {
        println!(
            "  {}  {}: {} failed: {}",
            "✗".red(),
            failure.entity,
            failure.action,
            failure.error
        );
    }
}
