//! Sync scheduler: periodic reconciliation, a single-worker cycle queue and
//! the control socket.

mod error;
pub mod protocol;
mod runtime;
mod state;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, DaemonClient, DaemonRequest, DaemonResponse,
    StopAck,
};
pub use runtime::{run, run_with, start_blocking, Schedule};
pub use state::{CycleRecord, DaemonState, DaemonStatus};
