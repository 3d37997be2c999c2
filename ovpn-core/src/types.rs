//! Domain types for the user directory and the session ledger.
//!
//! All timestamps are `DateTime<Utc>`. All types are serializable via
//! serde + serde_yaml.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Numeric key of a user in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Numeric key of a session ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A VPN user. Owned by the provisioning side; the reconciler only flips
/// `is_online` and `last_connection_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Unique; matched exactly against the certificate common name.
    pub name: String,
    #[serde(default)]
    pub is_online: bool,
    /// Last routing-table reference seen for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connection_time: Option<DateTime<Utc>>,
}

/// One row of the session ledger.
///
/// While `is_online` is true the row is the user's open session and
/// `session_ended_at` is `None`. Finalizing sets both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLog {
    pub id: SessionId,
    pub user_id: UserId,
    pub is_online: bool,
    pub online_duration_secs: u64,
    /// Bytes received + bytes sent, as last reported.
    pub traffic_usage: u64,
    pub session_started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ClientLog {
    /// Start of the session while it is open, end of the session once finalized.
    pub fn last_connection_time(&self) -> DateTime<Utc> {
        self.session_ended_at.unwrap_or(self.session_started_at)
    }

    pub fn is_open(&self) -> bool {
        self.is_online && self.session_ended_at.is_none()
    }
}

/// Insert payload for [`crate::Directory::create_session`]. New rows are always open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClientLog {
    pub user_id: UserId,
    pub online_duration_secs: u64,
    pub traffic_usage: u64,
    pub session_started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewClientLog {
    pub(crate) fn into_row(self, id: SessionId) -> ClientLog {
        ClientLog {
            id,
            user_id: self.user_id,
            is_online: true,
            online_duration_secs: self.online_duration_secs,
            traffic_usage: self.traffic_usage,
            session_started_at: self.session_started_at,
            session_ended_at: None,
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
