use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// ```text
/// Queued ──► Running ──► Completed | Failed
///              │
///              ├──► TimingOut ──► Completed | Failed | Killed
///              └──► Yielding  ──► Queued | Killed
/// ```
///
/// `Canceled` is reached only by tasks that never started before the run was shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    /// Waiting for admission.
    Queued,
    /// Child process is running within its budget.
    Running,
    /// Timeout exceeded; the task is being stopped.
    TimingOut,
    /// Chosen to shed load; the task is being stopped and will be re-queued.
    Yielding,
    /// Child exited successfully.
    Completed,
    /// Child exited non-zero, died by a signal, or could not be spawned.
    Failed,
    /// Child had to be force-killed.
    Killed,
    /// Never started before shutdown.
    Canceled,
}

impl TaskState {
    /// Returns `true` if the task will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Killed | TaskState::Canceled
        )
    }

    /// Returns `true` while a stop episode is in progress.
    pub fn is_escalating(&self) -> bool {
        matches!(self, TaskState::TimingOut | TaskState::Yielding)
    }

    /// Returns `true` for states in which the task owns a live child process.
    pub fn holds_process(&self) -> bool {
        matches!(
            self,
            TaskState::Running | TaskState::TimingOut | TaskState::Yielding
        )
    }

    /// Returns `true` for terminal states that count as a failed run.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskState::Failed | TaskState::Killed | TaskState::Canceled
        )
    }

    /// Stable lower-case name, used in reports and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::TimingOut => "timing-out",
            TaskState::Yielding => "yielding",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Killed => "killed",
            TaskState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::TaskState;

    const ALL: [TaskState; 8] = [
        TaskState::Queued,
        TaskState::Running,
        TaskState::TimingOut,
        TaskState::Yielding,
        TaskState::Completed,
        TaskState::Failed,
        TaskState::Killed,
        TaskState::Canceled,
    ];

    #[test]
    fn terminal_states_never_hold_a_process() {
        for s in ALL {
            if s.is_terminal() {
                assert!(!s.holds_process(), "{s} is terminal but holds a process");
                assert!(!s.is_escalating());
            }
        }
    }

    #[test]
    fn only_completed_is_a_successful_terminal_state() {
        let ok: Vec<_> = ALL
            .into_iter()
            .filter(|s| s.is_terminal() && !s.is_failure())
            .collect();
        assert_eq!(ok, vec![TaskState::Completed]);
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_string(&TaskState::TimingOut).unwrap();
        assert_eq!(json, r#""timingOut""#);
    }
}
