//! ovpn core library: domain types, directory persistence, configuration.
//!
//! Public API surface:
//! - [`types`]: user and session-ledger records, id newtypes
//! - [`directory`]: the [`Directory`] store trait and [`MemoryDirectory`]
//! - [`store`]: [`YamlDirectory`], the file-backed store
//! - [`config`]: [`Config`] load / save
//! - [`paths`]: `~/.ovpnadm` layout
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod directory;
pub mod error;
pub mod paths;
pub mod store;
pub mod types;

pub use config::Config;
pub use directory::{Directory, DirectoryFile, MemoryDirectory};
pub use error::{ConfigError, StoreError};
pub use store::YamlDirectory;
pub use types::{ClientLog, NewClientLog, SessionId, User, UserId};
