//! Scheduler bookkeeping, as kept by the worker and reported by `status`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ovpn_sync::CycleSummary;

/// Outcome of the most recent cycle. Exactly one of `summary` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// `timer` or `socket`.
    pub source: String,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<CycleSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counters shared between the worker and the socket server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonState {
    pub started_at: DateTime<Utc>,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    #[serde(default)]
    pub last_cycle: Option<CycleRecord>,
}

impl DaemonState {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            cycles_ok: 0,
            cycles_failed: 0,
            last_cycle: None,
        }
    }

    pub(crate) fn record(&mut self, source: &str, outcome: &Result<CycleSummary, String>) {
        let (summary, error) = match outcome {
            Ok(summary) => {
                self.cycles_ok += 1;
                (Some(summary.clone()), None)
            }
            Err(err) => {
                self.cycles_failed += 1;
                (None, Some(err.clone()))
            }
        };
        self.last_cycle = Some(CycleRecord {
            source: source.to_string(),
            finished_at: Utc::now(),
            summary,
            error,
        });
    }
}

/// Reply to the `status` command: process facts plus a [`DaemonState`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: u32,
    pub socket: PathBuf,
    pub status_log: PathBuf,
    pub poll_interval_secs: u64,
    pub cycle_timeout_secs: u64,
    #[serde(flatten)]
    pub state: DaemonState,
}
