//! Error types shared by the process table backends and the family tracker.
//!
//! There are two layers:
//! - [`ReadError`]: a single point-in-time read about one process failed.
//!   Normal churn; callers skip the process for this round.
//! - [`FamilyError`]: a whole build/refresh pass failed, either because the
//!   process table could not be opened or because ancestry data is corrupt.

use crate::process::Pid;

/// Failure of a single per-process read.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("process {0} not found")]
    NotFound(Pid),

    #[error("cannot read {file} for process {pid}: {source}")]
    Unreadable {
        pid: Pid,
        file: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {file} for process {pid}: {reason}")]
    Malformed {
        pid: Pid,
        file: &'static str,
        reason: String,
    },
}

impl ReadError {
    /// Pid the read was about.
    pub fn pid(&self) -> Pid {
        match self {
            ReadError::NotFound(pid) => *pid,
            ReadError::Unreadable { pid, .. } => *pid,
            ReadError::Malformed { pid, .. } => *pid,
        }
    }

    /// True when the process is gone (as opposed to unreadable data).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReadError::NotFound(_))
    }
}

/// Failure of a whole family build or refresh pass.
#[derive(Debug, thiserror::Error)]
pub enum FamilyError {
    #[error("failed to scan process table: {0}")]
    Scan(#[source] std::io::Error),

    #[error("ancestry of process {pid} cannot be resolved (walk stopped at {stuck_at})")]
    BrokenAncestry { pid: Pid, stuck_at: Pid },
}
