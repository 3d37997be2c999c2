//! Snapshot types produced by the parser.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A client counts as online when its last routing reference is at most this
/// many seconds older than the log timestamp.
pub const ONLINE_WINDOW_SECS: i64 = 5 * 60;

/// Status file dialect, decided by the first structural marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `status-version 2` (comma) or `3` (tab): tagged records.
    Tagged { separator: char },
    /// `status-version 1`: plain CSV sections.
    Legacy,
}

/// Knobs for username derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fixed prefix stripped from common names (e.g. `"vpn-"`).
    pub common_name_prefix: Option<String>,
}

/// One connected client, merged from its client-list row and (if present)
/// its routing-table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSession {
    pub common_name: String,
    pub username: String,
    pub real_address: String,
    pub virtual_address: String,
    pub virtual_ipv6_address: Option<String>,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub bytes_received_text: String,
    pub bytes_sent_text: String,
    pub connected_since: Option<DateTime<Utc>>,
    /// Raw `time_t` as written; 0 when the row carried no usable epoch.
    pub connected_since_epoch: i64,
    pub last_ref: Option<DateTime<Utc>>,
    pub last_ref_epoch: i64,
    pub client_id: String,
    pub peer_id: String,
    pub cipher: String,
    pub is_online: bool,
    pub online_duration_secs: u64,
}

impl ClientSession {
    /// Bytes received + bytes sent.
    pub fn traffic_usage(&self) -> u64 {
        self.bytes_received.saturating_add(self.bytes_sent)
    }
}

/// Why a line was not used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    /// No tagged or legacy marker seen anywhere in the file.
    NoMarker,
    /// Untagged row outside any client-list or routing-table section.
    OutsideSection,
    UnknownRecord { tag: String },
    TooFewFields { expected: usize, found: usize },
    EmptyCommonName,
    InvalidNumber { column: &'static str, value: String },
    InvalidTimestamp,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoMarker => write!(f, "no status marker before this line"),
            SkipReason::OutsideSection => write!(f, "row outside a known section"),
            SkipReason::UnknownRecord { tag } => write!(f, "unknown record type '{tag}'"),
            SkipReason::TooFewFields { expected, found } => {
                write!(f, "expected at least {expected} fields, found {found}")
            }
            SkipReason::EmptyCommonName => write!(f, "empty common name"),
            SkipReason::InvalidNumber { column, value } => {
                write!(f, "{column}: '{value}' is not a number")
            }
            SkipReason::InvalidTimestamp => write!(f, "unparsable timestamp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    /// 1-based.
    pub line: usize,
    pub reason: SkipReason,
}

/// Parse result. `clients` is keyed by common name and carries no ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub dialect: Option<Dialect>,
    /// The file's own "as of" time; `None` if missing or unparsable.
    pub log_time: Option<DateTime<Utc>>,
    pub clients: HashMap<String, ClientSession>,
    pub skipped: Vec<SkippedLine>,
}

impl StatusSnapshot {
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn get(&self, common_name: &str) -> Option<&ClientSession> {
        self.clients.get(common_name)
    }

    /// Clients ordered by common name, for display.
    pub fn sorted_clients(&self) -> Vec<&ClientSession> {
        let mut clients: Vec<&ClientSession> = self.clients.values().collect();
        clients.sort_by(|a, b| a.common_name.cmp(&b.common_name));
        clients
    }

    pub fn online_count(&self) -> usize {
        self.clients.values().filter(|c| c.is_online).count()
    }
}
