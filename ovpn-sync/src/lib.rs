//! # ovpn-sync
//!
//! Merges a parsed status snapshot into the user directory and session
//! ledger.
//!
//! [`SessionReconciler::run_cycle`] reads the status log and applies it;
//! [`Pipeline`] wires a reconciler to the configured directory store so the
//! CLI and the daemon run cycles the same way.

pub mod error;
pub mod pipeline;
pub mod reconciler;
pub mod reporter;
pub mod summary;

pub use error::SyncError;
pub use pipeline::Pipeline;
pub use reconciler::SessionReconciler;
pub use reporter::{LogReporter, Reporter};
pub use summary::{CycleSummary, EntityFailure};
