//! YAML file-backed directory store.
//!
//! # Storage layout
//!
//! One document, `~/.ovpnadm/directory.yaml` by default, holding every user
//! and every ledger row (see [`DirectoryFile`]).
//!
//! # Consistency
//!
//! Users are provisioned by tools outside this crate, so the file is re-read
//! on every call instead of cached. Each mutating call is load → modify →
//! atomic save; there is no transaction spanning calls. Writers inside one
//! process are serialized by a mutex.
//!
//! Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::directory::{Directory, DirectoryFile};
use crate::error::{store_io_err, StoreError};
use crate::paths;
use crate::types::{ClientLog, NewClientLog, User, UserId};

/// [`Directory`] persisted to a single YAML file.
#[derive(Debug)]
pub struct YamlDirectory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl YamlDirectory {
    /// Open (without creating) the store at `path`. A missing file reads as
    /// an empty directory.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<home>/.ovpnadm/directory.yaml`
    pub fn open_at(home: &Path) -> Self {
        Self::open(paths::directory_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a new offline user.
    pub fn add_user(&self, name: &str) -> Result<User, StoreError> {
        self.mutate(|file| file.add_user(name))
    }

    fn read<T>(&self, f: impl FnOnce(&DirectoryFile) -> T) -> Result<T, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let file = load_file(&self.path)?;
        Ok(f(&file))
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut DirectoryFile) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut file = load_file(&self.path)?;
        let out = f(&mut file)?;
        save_file(&self.path, &file)?;
        Ok(out)
    }
}

impl Directory for YamlDirectory {
    fn find_online_users(&self) -> Result<Vec<User>, StoreError> {
        self.read(DirectoryFile::find_online_users)
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        self.read(|file| file.find_user_by_name(name))
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.mutate(|file| file.save_user(user))
    }

    fn find_open_session(&self, user_id: UserId) -> Result<Option<ClientLog>, StoreError> {
        self.read(|file| file.find_open_session(user_id))
    }

    fn create_session(&self, session: NewClientLog) -> Result<ClientLog, StoreError> {
        self.mutate(|file| Ok(file.create_session(session)))
    }

    fn save_session(&self, session: &ClientLog) -> Result<(), StoreError> {
        self.mutate(|file| file.save_session(session))
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.read(DirectoryFile::list_users)
    }

    fn list_sessions(&self, user_id: UserId) -> Result<Vec<ClientLog>, StoreError> {
        self.read(|file| file.list_sessions(user_id))
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn load_file(path: &Path) -> Result<DirectoryFile, StoreError> {
    if !path.exists() {
        return Ok(DirectoryFile::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| store_io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(DirectoryFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_file(path: &Path, file: &DirectoryFile) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| store_io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(file)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| store_io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path).map_err(|e| store_io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| store_io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| store_io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let home = make_home();
        let store = YamlDirectory::open_at(home.path());
        assert!(store.list_users().unwrap().is_empty());
        assert!(store.find_online_users().unwrap().is_empty());
        assert!(!store.path().exists(), "reads must not create the file");
    }

    #[test]
    fn add_user_creates_file_with_perms() {
        let home = make_home();
        let store = YamlDirectory::open_at(home.path());
        store.add_user("alice").expect("add");
        assert!(store.path().exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        let store = YamlDirectory::open_at(home.path());
        store.add_user("alice").expect("add");
        let tmp = store.path().with_extension("yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn sessions_roundtrip_through_disk() {
        let home = make_home();
        let store = YamlDirectory::open_at(home.path());
        let alice = store.add_user("alice").expect("add");
        let started = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let row = store
            .create_session(NewClientLog {
                user_id: alice.id,
                online_duration_secs: 12,
                traffic_usage: 2048,
                session_started_at: started,
                created_at: started,
            })
            .expect("create");

        let reopened = YamlDirectory::open_at(home.path());
        let open = reopened
            .find_open_session(alice.id)
            .unwrap()
            .expect("open row survives reopen");
        assert_eq!(open, row);
    }

    #[test]
    fn external_edits_are_observed() {
        let home = make_home();
        let store = YamlDirectory::open_at(home.path());
        store.add_user("alice").expect("add");

        // Another tool provisions a user behind our back.
        let other = YamlDirectory::open_at(home.path());
        other.add_user("bob").expect("add bob");

        assert!(store.find_user_by_name("bob").unwrap().is_some());
    }

    #[test]
    fn corrupt_file_is_a_parse_error_with_path() {
        let home = make_home();
        let store = YamlDirectory::open_at(home.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "users: [unclosed").unwrap();

        let err = store.list_users().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("directory.yaml"));
    }
}
