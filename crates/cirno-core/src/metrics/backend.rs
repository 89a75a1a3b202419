use std::sync::Arc;

use cirno_model::{SignalKind, TaskState};

/// Final outcome of a task, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    /// Force-killed at the top of the ladder.
    Killed,
    /// Never started before shutdown.
    Canceled,
}

impl TaskOutcome {
    /// Outcome for a terminal state, `None` for live states.
    pub fn from_state(state: TaskState) -> Option<Self> {
        match state {
            TaskState::Completed => Some(TaskOutcome::Completed),
            TaskState::Failed => Some(TaskOutcome::Failed),
            TaskState::Killed => Some(TaskOutcome::Killed),
            TaskState::Canceled => Some(TaskOutcome::Canceled),
            _ => None,
        }
    }

    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed => "failed",
            TaskOutcome::Killed => "killed",
            TaskOutcome::Canceled => "canceled",
        }
    }
}

/// Backend metrics collection interface.
///
/// Every method is called from the scheduling loop, so implementations should not block.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a child process being spawned for a task (first run or re-admission).
    fn record_task_started(&self);

    /// Record a task reaching a terminal state.
    ///
    /// # Arguments
    /// - `outcome`: How the task terminated
    /// - `duration_ms`: Time spent holding a process, summed over all attempts
    fn record_task_finished(&self, outcome: TaskOutcome, duration_ms: u64);

    /// Record a signal sent by the scheduler.
    fn record_signal(&self, signal: SignalKind);

    /// Record a per-task error (spawn, signal delivery, discovery, reap).
    fn record_task_error(&self, error_kind: &str);

    /// Record the load sample taken for admission.
    fn record_load_sample(&self, load: f64);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_exists_only_for_terminal_states() {
        assert_eq!(
            TaskOutcome::from_state(TaskState::Killed),
            Some(TaskOutcome::Killed)
        );
        assert_eq!(TaskOutcome::from_state(TaskState::Running), None);
        assert_eq!(TaskOutcome::from_state(TaskState::Yielding), None);
        assert_eq!(TaskOutcome::Canceled.as_label(), "canceled");
    }
}
