//! Shared cycle entrypoint used by the CLI and the daemon.

use std::path::Path;
use std::sync::Arc;

use ovpn_core::{Config, Directory, YamlDirectory};

use crate::{CycleSummary, SessionReconciler, SyncError};

/// A reconciler bound to the directory store it writes to.
#[derive(Clone)]
pub struct Pipeline {
    reconciler: Arc<SessionReconciler>,
    directory: Arc<dyn Directory>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Reconciler and YAML store as described by `config`.
    pub fn from_config(home: &Path, config: &Config) -> Self {
        let directory = YamlDirectory::open(config.directory_path_at(home));
        Self::new(SessionReconciler::from_config(config), Arc::new(directory))
    }

    pub fn new(reconciler: SessionReconciler, directory: Arc<dyn Directory>) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            directory,
        }
    }

    /// Run one cycle. Blocking.
    pub fn run(&self) -> Result<CycleSummary, SyncError> {
        self.reconciler.run_cycle(self.directory.as_ref())
    }

    pub fn reconciler(&self) -> &SessionReconciler {
        &self.reconciler
    }

    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }
}
