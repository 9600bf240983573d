//! Command handlers.

mod common;
mod run_cmd;
mod status_cmd;
mod verify_cmd;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use run_cmd::{RunStatus, RunSummary, index_run, reconcile_index};
pub use status_cmd::index_status;
pub use verify_cmd::{Problem, VERIFY_FAILED_EXIT_CODE, Violation, index_verify, verify_index};
