//! `~/.ovpnadm` layout.
//!
//! ```text
//! ~/.ovpnadm/
//!   config.yaml       (engine configuration)
//!   directory.yaml    (users + session ledger, mode 0600)
//!   run/daemon.sock   (control socket, mode 0600)
//! ```

use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const ROOT_DIR: &str = ".ovpnadm";
pub const CONFIG_FILE: &str = "config.yaml";
pub const DIRECTORY_FILE: &str = "directory.yaml";
pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn root_at(home: &Path) -> PathBuf {
    home.join(ROOT_DIR)
}

pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join(CONFIG_FILE)
}

pub fn directory_path_at(home: &Path) -> PathBuf {
    root_at(home).join(DIRECTORY_FILE)
}

pub fn run_dir(home: &Path) -> PathBuf {
    root_at(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    run_dir(home).join(DAEMON_SOCKET)
}

pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}
