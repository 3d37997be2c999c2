//! ovpnadm: VPN session bookkeeping for operators.
//!
//! # Usage
//!
//! ```text
//! ovpnadm init [--status-log <path>] [--poll-interval <secs>] [--prefix <p>] [--force]
//! ovpnadm clients [--status-log <path>] [--json] [--all]
//! ovpnadm sync [--status-log <path>] [--json]
//! ovpnadm users [--online] [--json]
//! ovpnadm sessions <user> [--json]
//! ovpnadm daemon start|stop|status|sync
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    clients::ClientsArgs, daemon::DaemonCommand, init::InitArgs, sessions::SessionsArgs,
    sync::SyncArgs, users::UsersArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ovpnadm",
    version,
    about = "Track which VPN clients are connected and keep the session ledger current",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.ovpnadm/config.yaml.
    Init(InitArgs),

    /// Parse the status log and show the connected clients.
    Clients(ClientsArgs),

    /// Run one reconciliation cycle in this process.
    Sync(SyncArgs),

    /// List directory users.
    Users(UsersArgs),

    /// Show the session ledger of one user.
    Sessions(SessionsArgs),

    /// Run or talk to the background reconciliation daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Clients(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Users(args) => args.run(),
        Commands::Sessions(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
