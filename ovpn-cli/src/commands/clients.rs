//! `ovpnadm clients`: what the status log says right now, no store access.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ovpn_status::{format_bytes, parse_file, ClientSession, ParseOptions, StatusSnapshot};

use super::{format_duration, format_time, load_config, print_json, ConfigOverrides};

#[derive(Args, Debug)]
pub struct ClientsArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Include clients whose routing entry is stale or missing.
    #[arg(long)]
    pub all: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "common name")]
    common_name: String,
    #[tabled(rename = "user")]
    username: String,
    #[tabled(rename = "real address")]
    real_address: String,
    #[tabled(rename = "virtual address")]
    virtual_address: String,
    #[tabled(rename = "rx")]
    received: String,
    #[tabled(rename = "tx")]
    sent: String,
    #[tabled(rename = "connected since")]
    connected_since: String,
    #[tabled(rename = "online for")]
    duration: String,
    #[tabled(rename = "state")]
    state: String,
}

impl ClientsArgs {
    pub fn run(self) -> Result<()> {
        let (_, config) = load_config(self.overrides)?;
        let options = ParseOptions {
            common_name_prefix: config.common_name_prefix.clone(),
        };
        let snapshot = parse_file(&config.status_log, &options)
            .with_context(|| format!("failed to parse {}", config.status_log.display()))?;

        let clients: Vec<&ClientSession> = snapshot
            .sorted_clients()
            .into_iter()
            .filter(|c| self.all || c.is_online)
            .collect();

        if self.json {
            return print_json(&clients);
        }
        print_table(&snapshot, &clients);
        Ok(())
    }
}

fn print_table(snapshot: &StatusSnapshot, clients: &[&ClientSession]) {
    println!(
        "Status as of {} ({} online / {} listed)",
        format_time(snapshot.log_time),
        snapshot.online_count(),
        snapshot.clients.len()
    );
    if !snapshot.skipped.is_empty() {
        println!(
            "{}",
            format!("{} malformed line(s) skipped", snapshot.skipped.len()).yellow()
        );
    }
    if clients.is_empty() {
        println!("No clients connected.");
        return;
    }

    let rows = clients.iter().map(|c| ClientRow {
        common_name: c.common_name.clone(),
        username: c.username.clone(),
        real_address: c.real_address.clone(),
        virtual_address: c.virtual_address.clone(),
        received: format_bytes(c.bytes_received),
        sent: format_bytes(c.bytes_sent),
        connected_since: format_time(c.connected_since),
        duration: format_duration(c.online_duration_secs),
        state: if c.is_online {
            "online".green().to_string()
        } else {
            "stale".dimmed().to_string()
        },
    });
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
