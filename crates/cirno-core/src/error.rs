use serde::Serialize;
use thiserror::Error;

use cirno_model::{ModelError, SignalKind};

use crate::control::Pid;

/// Run-level errors. Only configuration problems are fatal; they surface before the loop starts.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid task: {0}")]
    Spec(#[from] ModelError),

    #[error("load sample unavailable: {0}")]
    Load(String),
}

/// Failure local to one task.
///
/// Recorded on the task and reported; never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TaskError {
    #[error("spawn failed: {reason}")]
    Spawn { reason: String },

    #[error("failed to deliver {signal} to pid {pid}: {reason}")]
    Signal {
        pid: Pid,
        signal: SignalKind,
        reason: String,
    },

    #[error("descendant discovery failed for pid {pid}: {reason}")]
    Discovery { pid: Pid, reason: String },

    #[error("failed to reap pid {pid}: {reason}")]
    Reap { pid: Pid, reason: String },
}

impl TaskError {
    /// Error category, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Spawn { .. } => "spawn",
            TaskError::Signal { .. } => "signal",
            TaskError::Discovery { .. } => "discovery",
            TaskError::Reap { .. } => "reap",
        }
    }
}
