//! Snapshot → directory merge.
//!
//! One cycle:
//!
//! 1. Parse the status log. A read failure aborts with nothing mutated.
//! 2. Read the users currently flagged online. A failure here aborts too,
//!    since disconnects are computed against this set.
//! 3. For every client in the snapshot: flag its user online and open or
//!    refresh the user's open ledger row.
//! 4. For every user from step 2 missing from the snapshot: flag it offline
//!    and finalize its open ledger row.
//!
//! Store failures in steps 3 and 4 affect only the entity involved and are
//! collected in the [`CycleSummary`]. There is no rollback.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Instant;

use chrono::{DateTime, Utc};

use ovpn_core::{Config, Directory, NewClientLog, StoreError, User};
use ovpn_status::{parse_file, ClientSession, ParseOptions, StatusSnapshot};

use crate::error::SyncError;
use crate::reporter::{LogReporter, Reporter};
use crate::summary::{CycleSummary, EntityFailure};

/// Runs reconciliation cycles for one status log. Not reentrant: a call made
/// while another cycle is running fails with [`SyncError::CycleInProgress`].
pub struct SessionReconciler {
    status_log: PathBuf,
    options: ParseOptions,
    reporter: Arc<dyn Reporter>,
    running: Mutex<()>,
}

impl std::fmt::Debug for SessionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionReconciler")
            .field("status_log", &self.status_log)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SessionReconciler {
    pub fn new(status_log: impl Into<PathBuf>, options: ParseOptions) -> Self {
        Self {
            status_log: status_log.into(),
            options,
            reporter: Arc::new(LogReporter),
            running: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.status_log.clone(),
            ParseOptions {
                common_name_prefix: config.common_name_prefix.clone(),
            },
        )
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn status_log(&self) -> &Path {
        &self.status_log
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Read the status log and merge it into `directory`.
    pub fn run_cycle(&self, directory: &dyn Directory) -> Result<CycleSummary, SyncError> {
        let result = self.enter().and_then(|_guard| {
            let started = Instant::now();
            let snapshot = parse_file(&self.status_log, &self.options)?;
            self.reconcile(&snapshot, directory, Utc::now(), started)
        });
        if let Err(err) = &result {
            self.reporter.cycle_failed(err);
        }
        result
    }

    /// Merge an already parsed snapshot. `now` stands in for the wall clock.
    pub fn apply(
        &self,
        snapshot: &StatusSnapshot,
        directory: &dyn Directory,
        now: DateTime<Utc>,
    ) -> Result<CycleSummary, SyncError> {
        let result = self
            .enter()
            .and_then(|_guard| self.reconcile(snapshot, directory, now, Instant::now()));
        if let Err(err) = &result {
            self.reporter.cycle_failed(err);
        }
        result
    }

    fn enter(&self) -> Result<MutexGuard<'_, ()>, SyncError> {
        match self.running.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(SyncError::CycleInProgress),
            // The mutex guards no data; a panicked cycle leaves nothing to repair.
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }

    fn reconcile(
        &self,
        snapshot: &StatusSnapshot,
        directory: &dyn Directory,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<CycleSummary, SyncError> {
        for line in &snapshot.skipped {
            self.reporter.skipped_line(line);
        }

        let online_at_start = directory.find_online_users()?;

        let mut cycle = Cycle {
            directory,
            reporter: self.reporter.as_ref(),
            now,
            summary: CycleSummary {
                started_at: Some(now),
                log_time: snapshot.log_time,
                clients_seen: snapshot.clients.len(),
                skipped_lines: snapshot.skipped.len(),
                ..CycleSummary::default()
            },
        };

        for entry in snapshot.sorted_clients() {
            cycle.confirm(entry);
        }
        for user in online_at_start {
            if !snapshot.clients.contains_key(&user.name) {
                cycle.disconnect(user);
            }
        }

        let mut summary = cycle.summary;
        summary.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.reporter.cycle_finished(&summary);
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// One cycle's working state
// ---------------------------------------------------------------------------

struct Cycle<'a> {
    directory: &'a dyn Directory,
    reporter: &'a dyn Reporter,
    now: DateTime<Utc>,
    summary: CycleSummary,
}

impl Cycle<'_> {
    fn fail(&mut self, entity: &str, action: &str, err: StoreError) {
        self.reporter.entity_failed(entity, action, &err);
        self.summary.failures.push(EntityFailure {
            entity: entity.to_string(),
            action: action.to_string(),
            error: err.to_string(),
        });
    }

    fn confirm(&mut self, entry: &ClientSession) {
        let name = entry.common_name.as_str();
        let mut user = match self.directory.find_user_by_name(name) {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.reporter.unknown_client(name);
                self.summary.unknown_clients.push(name.to_string());
                return;
            }
            Err(err) => return self.fail(name, "look up user", err),
        };

        user.is_online = true;
        user.last_connection_time = entry.last_ref.or(user.last_connection_time);
        if let Err(err) = self.directory.save_user(&user) {
            return self.fail(name, "save user", err);
        }
        self.summary.confirmed.push(user.name.clone());

        match self.directory.find_open_session(user.id) {
            Ok(None) => {
                let row = NewClientLog {
                    user_id: user.id,
                    online_duration_secs: entry.online_duration_secs,
                    traffic_usage: entry.traffic_usage(),
                    session_started_at: entry.connected_since.unwrap_or(self.now),
                    created_at: self.now,
                };
                match self.directory.create_session(row) {
                    Ok(_) => self.summary.sessions_opened += 1,
                    Err(err) => self.fail(name, "open session", err),
                }
            }
            Ok(Some(mut row)) => {
                row.online_duration_secs = entry.online_duration_secs;
                row.traffic_usage = entry.traffic_usage();
                if let Some(since) = entry.connected_since {
                    row.session_started_at = since;
                }
                match self.directory.save_session(&row) {
                    Ok(()) => self.summary.sessions_updated += 1,
                    Err(err) => self.fail(name, "update session", err),
                }
            }
            Err(err) => self.fail(name, "find open session", err),
        }
    }

    fn disconnect(&mut self, mut user: User) {
        user.is_online = false;
        if let Err(err) = self.directory.save_user(&user) {
            return self.fail(&user.name, "save user", err);
        }
        self.summary.disconnected.push(user.name.clone());

        match self.directory.find_open_session(user.id) {
            Ok(Some(mut row)) => {
                let elapsed = (self.now - row.session_started_at).num_seconds().max(0);
                row.is_online = false;
                row.online_duration_secs = elapsed as u64;
                row.session_ended_at = Some(self.now);
                match self.directory.save_session(&row) {
                    Ok(()) => self.summary.sessions_finalized += 1,
                    Err(err) => self.fail(&user.name, "finalize session", err),
                }
            }
            Ok(None) => {}
            Err(err) => self.fail(&user.name, "find open session", err),
        }
    }
}
