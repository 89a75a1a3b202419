//! Load-based admission and eviction.
//!
//! The policy is a pure function of the load sample and a view of the task set, so the
//! same inputs always produce the same decision.
use std::time::Instant;

use cirno_model::{TaskId, Weight};

use crate::config::SchedulerConfig;
use crate::load::Pressure;

/// Queued task as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedTask {
    pub id: TaskId,
    pub weight: Weight,
}

/// Running task (not in a stop episode) as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningTask {
    pub id: TaskId,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct AdmissionInput<'a> {
    pub load: f64,
    /// Queued tasks in queue order.
    pub queued: &'a [QueuedTask],
    /// Eviction candidates: tasks in `Running`.
    pub running: &'a [RunningTask],
    /// Tasks holding a process, including those in a stop episode.
    pub live: usize,
    pub pressure: Pressure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Tasks to start, in order.
    pub admit: Vec<TaskId>,
    /// Running task to stop in order to shed load.
    pub victim: Option<TaskId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionPolicy {
    threshold: f64,
    min_running: usize,
    max_running: Option<usize>,
}

impl AdmissionPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            min_running: 0,
            max_running: None,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            threshold: config.threshold,
            min_running: config.min_running,
            max_running: config.max_running,
        }
    }

    pub fn decide(&self, input: &AdmissionInput<'_>) -> AdmissionDecision {
        let overloaded = input.load > self.threshold || input.pressure == Pressure::Shed;
        let clear = input.pressure == Pressure::Clear;
        let mut decision = AdmissionDecision::default();

        let mut live = input.live;
        let mut projected = input.load;
        for queued in input.queued {
            if self.max_running.is_some_and(|max| live >= max) {
                break;
            }
            let below_floor = live < self.min_running;
            let fits = clear && !overloaded && projected <= self.threshold;
            if !(below_floor || fits) {
                break;
            }
            decision.admit.push(queued.id);
            projected += queued.weight;
            live += 1;
        }

        if overloaded && input.running.len() > self.min_running {
            decision.victim = input
                .running
                .iter()
                .min_by_key(|r| (r.started_at, r.id))
                .map(|r| r.id);
        }
        decision
    }
}
