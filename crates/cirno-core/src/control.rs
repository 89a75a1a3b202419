use std::fmt;

use serde::Serialize;

use cirno_model::{SignalKind, TaskId, TaskSpec};

use crate::error::TaskError;

/// OS process id.
pub type Pid = u32;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitOutcome {
    /// Exit code, if the child exited normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Terminating signal number, if the child was killed by a signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
}

impl ExitOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Only a zero exit code counts as success.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit"),
        }
    }
}

/// Result of a signal delivery that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The target no longer exists. Not an error.
    AlreadyGone,
}

/// OS capabilities the scheduler relies on.
///
/// Every child is started as the leader of its own process group, so the child's pid
/// doubles as the group id for [`ProcessControl::signal_group`].
pub trait ProcessControl {
    /// Start the task's command as a child process.
    fn spawn(&mut self, id: TaskId, label: &str, spec: &TaskSpec) -> Result<Pid, TaskError>;

    /// Non-blocking exit check. Collects the exit status once the child has ended.
    fn try_reap(&mut self, pid: Pid) -> Result<Option<ExitOutcome>, TaskError>;

    /// Deliver a signal to one process.
    fn signal(&mut self, pid: Pid, signal: SignalKind) -> Result<Delivery, TaskError>;

    /// Deliver a signal to every member of a process group.
    fn signal_group(&mut self, pgid: Pid, signal: SignalKind) -> Result<Delivery, TaskError>;

    /// Current descendants of `pid`, not including `pid` itself.
    ///
    /// Parents come before their children in the returned list.
    fn descendants(&mut self, pid: Pid) -> Result<Vec<Pid>, TaskError>;

    /// Forget a child that will not be reaped.
    fn release(&mut self, pid: Pid);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_exit_is_success() {
        assert!(ExitOutcome::exited(0).success());
        assert!(!ExitOutcome::exited(1).success());
        assert!(!ExitOutcome::signaled(9).success());
    }

    #[test]
    fn display_names_the_cause() {
        assert_eq!(ExitOutcome::exited(3).to_string(), "exit code 3");
        assert_eq!(ExitOutcome::signaled(15).to_string(), "signal 15");
    }
}
