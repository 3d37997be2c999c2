//! `ovpnadm sessions <user>`: one user's ledger, newest first.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ovpn_core::{Directory, YamlDirectory};
use ovpn_status::format_bytes;

use super::{format_duration, format_time, load_config, print_json, ConfigOverrides};

#[derive(Args, Debug)]
pub struct SessionsArgs {
    /// User name (exact match).
    pub user: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "started")]
    started: String,
    #[tabled(rename = "ended")]
    ended: String,
    #[tabled(rename = "duration")]
    duration: String,
    #[tabled(rename = "traffic")]
    traffic: String,
    #[tabled(rename = "state")]
    state: String,
}

impl SessionsArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = load_config(ConfigOverrides::default())?;
        let directory = YamlDirectory::open(config.directory_path_at(&home));
        let user = directory
            .find_user_by_name(&self.user)
            .with_context(|| format!("failed to read {}", directory.path().display()))?
            .with_context(|| format!("no user named '{}'", self.user))?;
        let sessions = directory
            .list_sessions(user.id)
            .with_context(|| format!("failed to load sessions for '{}'", user.name))?;

        if self.json {
            return print_json(&sessions);
        }
        if sessions.is_empty() {
            println!("No sessions recorded for '{}'.", user.name);
            return Ok(());
        }

        let rows = sessions.into_iter().map(|s| SessionRow {
            id: s.id.0,
            state: if s.is_open() {
                "open".green().to_string()
            } else {
                "closed".dimmed().to_string()
            },
            started: format_time(Some(s.session_started_at)),
            ended: format_time(s.session_ended_at),
            duration: format_duration(s.online_duration_secs),
            traffic: format_bytes(s.traffic_usage),
        });
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
