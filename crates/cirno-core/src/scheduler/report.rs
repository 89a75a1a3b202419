use std::time::{Duration, Instant};

use serde::Serialize;

use cirno_model::{Rung, TaskId, TaskState};

use crate::control::{ExitOutcome, Pid};
use crate::error::TaskError;
use crate::load::Pressure;
use crate::task::Task;

/// One state change applied during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub id: TaskId,
    pub from: TaskState,
    pub to: TaskState,
}

/// One ladder step taken during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RungChange {
    pub id: TaskId,
    pub from: Rung,
    pub to: Rung,
}

/// What happened during one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub tick: u64,
    /// Load sample used for admission, `None` when none was taken.
    pub load: Option<f64>,
    /// Resource band reported with the load sample.
    pub pressure: Option<Pressure>,
    pub admitted: Vec<TaskId>,
    pub victim: Option<TaskId>,
    pub transitions: Vec<Transition>,
    pub rung_changes: Vec<RungChange>,
}

impl TickReport {
    /// States `id` moved to during this tick, in order.
    pub fn states_of(&self, id: TaskId) -> Vec<TaskState> {
        self.transitions
            .iter()
            .filter(|t| t.id == id)
            .map(|t| t.to)
            .collect()
    }

    /// Rungs `id` climbed to during this tick, in order.
    pub fn rungs_of(&self, id: TaskId) -> Vec<Rung> {
        self.rung_changes
            .iter()
            .filter(|c| c.id == id)
            .map(|c| c.to)
            .collect()
    }
}

/// Point-in-time view of a live task, for reporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: TaskId,
    pub label: String,
    pub state: TaskState,
    pub rung: Rung,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<Pid>,
    pub runtime_ms: u64,
}

impl TaskView {
    pub fn of(task: &Task, now: Instant) -> Self {
        Self {
            id: task.id(),
            label: task.label().to_string(),
            state: task.state(),
            rung: task.rung(),
            attempt: task.attempts(),
            pid: task.pid(),
            runtime_ms: millis(task.run_time(now)),
        }
    }
}

/// Final record of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    pub label: String,
    pub command: String,
    pub state: TaskState,
    pub attempts: u32,
    pub timed_out: bool,
    pub unreaped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitOutcome>,
    pub run_time_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TaskError>,
}

impl TaskRecord {
    pub fn of(task: &Task, now: Instant) -> Self {
        Self {
            id: task.id(),
            label: task.label().to_string(),
            command: task.spec().command_line(),
            state: task.state(),
            attempts: task.attempts(),
            timed_out: task.timed_out(),
            unreaped: task.unreaped(),
            exit: task.exit(),
            run_time_ms: millis(task.run_time(now)),
            errors: task.errors().to_vec(),
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub ticks: u64,
    /// `true` when the run was cut short by cancellation.
    pub canceled: bool,
    /// Every task, in id order.
    pub tasks: Vec<TaskRecord>,
}

impl RunReport {
    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    /// `true` when every task completed.
    pub fn success(&self) -> bool {
        !self.canceled && self.tasks.iter().all(|t| t.state == TaskState::Completed)
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, state: TaskState) -> TaskRecord {
        TaskRecord {
            id: TaskId::new(id),
            label: format!("task-{id}"),
            command: "true".into(),
            state,
            attempts: 1,
            timed_out: false,
            unreaped: false,
            exit: None,
            run_time_ms: 0,
            errors: Vec::new(),
        }
    }

    #[test]
    fn success_requires_every_task_completed() {
        let mut report = RunReport {
            ticks: 3,
            canceled: false,
            tasks: vec![
                record(1, TaskState::Completed),
                record(2, TaskState::Completed),
            ],
        };
        assert!(report.success());

        report.tasks.push(record(3, TaskState::Killed));
        assert!(!report.success());
        assert_eq!(report.count(TaskState::Completed), 2);
        assert_eq!(report.count(TaskState::Killed), 1);
    }

    #[test]
    fn serializes_in_camel_case() {
        let report = RunReport {
            ticks: 1,
            canceled: false,
            tasks: vec![record(1, TaskState::TimingOut)],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tasks"][0]["state"], "timingOut");
        assert_eq!(json["tasks"][0]["runTimeMs"], 0);
        assert!(json["tasks"][0].get("errors").is_none());
    }
}
