//! The directory store contract consumed by the reconciler.
//!
//! [`Directory`] is the seam between the engine and whatever owns users and
//! the session ledger. Two implementations ship here:
//! - [`MemoryDirectory`]: process-local, used by tests and embedders
//! - [`crate::YamlDirectory`]: `~/.ovpnadm/directory.yaml`
//!
//! Both delegate the row bookkeeping to [`DirectoryFile`], so lookup and
//! update rules are identical regardless of backing.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{ClientLog, NewClientLog, SessionId, User, UserId};

/// Current on-disk schema version of [`DirectoryFile`].
pub const DIRECTORY_VERSION: u32 = 1;

/// Store primitives the reconciler needs. Every call is independent; there
/// is no transaction spanning several calls.
pub trait Directory: Send + Sync {
    /// Users currently flagged online.
    fn find_online_users(&self) -> Result<Vec<User>, StoreError>;

    /// Exact, case-sensitive name match.
    fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError>;

    /// Overwrite an existing user. Fails with `UserNotFound` for unknown ids.
    fn save_user(&self, user: &User) -> Result<(), StoreError>;

    /// The user's most recent open ledger row, if any.
    fn find_open_session(&self, user_id: UserId) -> Result<Option<ClientLog>, StoreError>;

    /// Insert an open ledger row and return it with its assigned id.
    fn create_session(&self, session: NewClientLog) -> Result<ClientLog, StoreError>;

    /// Overwrite an existing ledger row. Fails with `SessionNotFound` for unknown ids.
    fn save_session(&self, session: &ClientLog) -> Result<(), StoreError>;

    /// All users, ordered by name.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// All ledger rows of one user, newest first.
    fn list_sessions(&self, user_id: UserId) -> Result<Vec<ClientLog>, StoreError>;
}

/// Whole-directory document: the unit that is loaded and saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryFile {
    pub version: u32,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub sessions: Vec<ClientLog>,
}

impl Default for DirectoryFile {
    fn default() -> Self {
        Self {
            version: DIRECTORY_VERSION,
            users: Vec::new(),
            sessions: Vec::new(),
        }
    }
}

impl DirectoryFile {
    pub fn find_online_users(&self) -> Vec<User> {
        self.users.iter().filter(|u| u.is_online).cloned().collect()
    }

    pub fn find_user_by_name(&self, name: &str) -> Option<User> {
        self.users.iter().find(|u| u.name == name).cloned()
    }

    pub fn save_user(&mut self, user: &User) -> Result<(), StoreError> {
        let slot = self
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::UserNotFound(user.id))?;
        *slot = user.clone();
        Ok(())
    }

    /// Register a new offline user. Names are unique.
    pub fn add_user(&mut self, name: &str) -> Result<User, StoreError> {
        if self.users.iter().any(|u| u.name == name) {
            return Err(StoreError::DuplicateUser(name.to_string()));
        }
        let next = self.users.iter().map(|u| u.id.0).max().unwrap_or(0) + 1;
        let user = User {
            id: UserId(next),
            name: name.to_string(),
            is_online: false,
            last_connection_time: None,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    /// Most recent by start time, ties broken by the higher id.
    pub fn find_open_session(&self, user_id: UserId) -> Option<ClientLog> {
        self.sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_online)
            .max_by_key(|s| (s.session_started_at, s.id))
            .cloned()
    }

    pub fn create_session(&mut self, session: NewClientLog) -> ClientLog {
        let next = self.sessions.iter().map(|s| s.id.0).max().unwrap_or(0) + 1;
        let row = session.into_row(SessionId(next));
        self.sessions.push(row.clone());
        row
    }

    pub fn save_session(&mut self, session: &ClientLog) -> Result<(), StoreError> {
        let slot = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or(StoreError::SessionNotFound(session.id))?;
        *slot = session.clone();
        Ok(())
    }

    pub fn list_users(&self) -> Vec<User> {
        let mut users = self.users.clone();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    pub fn list_sessions(&self, user_id: UserId) -> Vec<ClientLog> {
        let mut rows: Vec<ClientLog> = self
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
        rows
    }
}

fn sort_key(row: &ClientLog) -> (DateTime<Utc>, SessionId) {
    (row.session_started_at, row.id)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// [`Directory`] held entirely in memory behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    inner: Mutex<DirectoryFile>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: DirectoryFile) -> Self {
        Self {
            inner: Mutex::new(file),
        }
    }

    /// Convenience seeding: one offline user per name.
    pub fn with_users<I, S>(names: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut file = DirectoryFile::default();
        for name in names {
            file.add_user(name.as_ref())?;
        }
        Ok(Self::from_file(file))
    }

    pub fn add_user(&self, name: &str) -> Result<User, StoreError> {
        self.with(|file| file.add_user(name))
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Result<DirectoryFile, StoreError> {
        self.with(|file| Ok(file.clone()))
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut DirectoryFile) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut guard)
    }
}

impl Directory for MemoryDirectory {
    fn find_online_users(&self) -> Result<Vec<User>, StoreError> {
        self.with(|file| Ok(file.find_online_users()))
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        self.with(|file| Ok(file.find_user_by_name(name)))
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.with(|file| file.save_user(user))
    }

    fn find_open_session(&self, user_id: UserId) -> Result<Option<ClientLog>, StoreError> {
        self.with(|file| Ok(file.find_open_session(user_id)))
    }

    fn create_session(&self, session: NewClientLog) -> Result<ClientLog, StoreError> {
        self.with(|file| Ok(file.create_session(session)))
    }

    fn save_session(&self, session: &ClientLog) -> Result<(), StoreError> {
        self.with(|file| file.save_session(session))
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.with(|file| Ok(file.list_users()))
    }

    fn list_sessions(&self, user_id: UserId) -> Result<Vec<ClientLog>, StoreError> {
        self.with(|file| Ok(file.list_sessions(user_id)))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
