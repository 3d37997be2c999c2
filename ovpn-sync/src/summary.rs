//! Per-cycle outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A store call that failed for one entity. The cycle carried on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    /// User name (or common name) the failed call was made for.
    pub entity: String,
    /// Which step failed, e.g. `"save user"`.
    pub action: String,
    pub error: String,
}

/// What one reconciliation cycle observed and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: Option<DateTime<Utc>>,
    /// Timestamp the status file claimed for itself.
    pub log_time: Option<DateTime<Utc>>,
    pub clients_seen: usize,
    /// Users flagged online by this cycle.
    pub confirmed: Vec<String>,
    /// Users flagged offline by this cycle.
    pub disconnected: Vec<String>,
    pub sessions_opened: usize,
    pub sessions_updated: usize,
    pub sessions_finalized: usize,
    /// Common names with no matching user.
    pub unknown_clients: Vec<String>,
    pub failures: Vec<EntityFailure>,
    pub skipped_lines: usize,
    pub duration_ms: u64,
}

impl CycleSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line form used in logs and CLI output.
    pub fn headline(&self) -> String {
        format!(
            "{} clients, {} online, {} disconnected, sessions +{} ~{} -{}, {} unknown, {} failed",
            self.clients_seen,
            self.confirmed.len(),
            self.disconnected.len(),
            self.sessions_opened,
            self.sessions_updated,
            self.sessions_finalized,
            self.unknown_clients.len(),
            self.failures.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_counts_everything() {
        let summary = CycleSummary {
            clients_seen: 3,
            confirmed: vec!["alice".into(), "bob".into()],
            disconnected: vec!["carol".into()],
            sessions_opened: 1,
            sessions_updated: 1,
            sessions_finalized: 1,
            unknown_clients: vec!["mallory".into()],
            ..CycleSummary::default()
        };
        assert_eq!(
            summary.headline(),
            "3 clients, 2 online, 1 disconnected, sessions +1 ~1 -1, 1 unknown, 0 failed"
        );
        assert!(summary.is_clean());
    }

    #[test]
    fn json_form_keeps_failures_readable() {
        let summary = CycleSummary {
            failures: vec![EntityFailure {
                entity: "alice".into(),
                action: "save user".into(),
                error: "disk full".into(),
            }],
            ..CycleSummary::default()
        };
        let value = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(value["failures"][0]["action"], "save user");
        assert_eq!(value["started_at"], serde_json::Value::Null);

        let back: CycleSummary = serde_json::from_value(value).expect("deserialize");
        assert!(!back.is_clean());
    }
}
