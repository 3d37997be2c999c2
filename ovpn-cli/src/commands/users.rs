//! `ovpnadm users [--online]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use ovpn_core::{Directory, YamlDirectory};

use super::{format_time, load_config, print_json, ConfigOverrides};

#[derive(Args, Debug)]
pub struct UsersArgs {
    /// Only users currently flagged online.
    #[arg(long)]
    pub online: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "id")]
    id: u64,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "last connection")]
    last_connection: String,
}

impl UsersArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = load_config(ConfigOverrides::default())?;
        let directory = YamlDirectory::open(config.directory_path_at(&home));
        let users = if self.online {
            directory.find_online_users()
        } else {
            directory.list_users()
        }
        .with_context(|| format!("failed to read {}", directory.path().display()))?;

        if self.json {
            return print_json(&users);
        }
        if users.is_empty() {
            println!("No users.");
            return Ok(());
        }

        let rows = users.into_iter().map(|u| UserRow {
            id: u.id.0,
            state: if u.is_online {
                "online".green().to_string()
            } else {
                "offline".dimmed().to_string()
            },
            last_connection: format_time(u.last_connection_time),
            name: u.name,
        });
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
