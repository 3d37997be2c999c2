//! Error types for ovpn-sync.

use thiserror::Error;

use ovpn_core::StoreError;
use ovpn_status::StatusError;

/// Whole-cycle failures. Per-entity store errors never surface here; they
/// are collected in [`crate::CycleSummary::failures`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The status log could not be read. Nothing was mutated.
    #[error("status log error: {0}")]
    Status(#[from] StatusError),

    /// The opening online-user query failed. Nothing was mutated.
    #[error("directory error: {0}")]
    Store(#[from] StoreError),

    /// Another cycle holds the reconciler.
    #[error("a reconciliation cycle is already running")]
    CycleInProgress,
}
