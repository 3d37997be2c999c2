//! Where the reconciler sends its diagnostics.

use ovpn_core::StoreError;
use ovpn_status::SkippedLine;

use crate::error::SyncError;
use crate::summary::CycleSummary;

/// Sink for cycle events. The reconciler never logs directly.
pub trait Reporter: Send + Sync {
    fn skipped_line(&self, line: &SkippedLine);
    fn unknown_client(&self, common_name: &str);
    fn entity_failed(&self, entity: &str, action: &str, err: &StoreError);
    fn cycle_finished(&self, summary: &CycleSummary);
    fn cycle_failed(&self, err: &SyncError);
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn skipped_line(&self, line: &SkippedLine) {
        tracing::debug!("status log line {} skipped: {}", line.line, line.reason);
    }

    fn unknown_client(&self, common_name: &str) {
        tracing::warn!("no user named '{}' in directory; client ignored", common_name);
    }

    fn entity_failed(&self, entity: &str, action: &str, err: &StoreError) {
        tracing::warn!("{} failed for '{}': {}", action, entity, err);
    }

    fn cycle_finished(&self, summary: &CycleSummary) {
        if summary.is_clean() {
            tracing::info!("sync cycle: {}", summary.headline());
        } else {
            tracing::warn!("sync cycle with failures: {}", summary.headline());
        }
    }

    fn cycle_failed(&self, err: &SyncError) {
        tracing::error!("sync cycle aborted: {}", err);
    }
}
