//! The scheduling loop.
//!
//! Each tick runs, in order:
//! 1. reap exited children and apply their outcomes;
//! 2. move overdue `Running` tasks into a timeout episode;
//! 3. sample load and apply the admission policy (start tasks, pick at most one victim);
//! 4. advance the ladder of every task in a stop episode.
//!
//! [`Scheduler::tick`] is synchronous and takes `now` explicitly; [`Scheduler::run`]
//! drives it from a tokio interval.
mod driver;
pub use driver::{RunEnd, TickObserver};

mod report;
pub use report::{RunReport, RungChange, TaskRecord, TaskView, TickReport, Transition};


use std::time::Instant;

use tracing::{debug, error, info, warn};

use cirno_model::{EpisodeKind, Rung, SignalKind, TaskId, TaskSpec, TaskState};

use crate::admission::{AdmissionInput, AdmissionPolicy, QueuedTask, RunningTask};
use crate::config::SchedulerConfig;
use crate::control::{Delivery, ExitOutcome, Pid, ProcessControl};
use crate::error::{CoreError, TaskError};
use crate::escalation::{EscalationController, Step, Sweep};
use crate::load::{LoadSource, Pressure};
use crate::metrics::{MetricsHandle, TaskOutcome, noop_metrics};
use crate::task::{Episode, Task, TaskSet};
use report::millis;

pub struct Scheduler<P> {
    config: SchedulerConfig,
    admission: AdmissionPolicy,
    escalation: EscalationController,
    tasks: TaskSet,
    control: P,
    metrics: MetricsHandle,
    ticks: u64,
    canceled: bool,
}

impl<P: ProcessControl> Scheduler<P> {
    /// Create a scheduler; fails on invalid configuration.
    pub fn new(config: SchedulerConfig, control: P) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            admission: AdmissionPolicy::from_config(&config),
            escalation: EscalationController::from_config(&config),
            config,
            tasks: TaskSet::default(),
            control,
            metrics: noop_metrics(),
            ticks: 0,
            canceled: false,
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn control(&self) -> &P {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut P {
        &mut self.control
    }

    /// Queue a task. Ids follow submission order.
    pub fn submit(&mut self, spec: TaskSpec) -> Result<TaskId, CoreError> {
        spec.validate()?;
        let id = self.tasks.insert(spec, &self.config);
        debug!(task = %id, "task queued");
        Ok(id)
    }

    pub fn submit_all<I>(&mut self, specs: I) -> Result<Vec<TaskId>, CoreError>
    where
        I: IntoIterator<Item = TaskSpec>,
    {
        specs.into_iter().map(|spec| self.submit(spec)).collect()
    }

    /// `true` once every task is terminal.
    pub fn is_drained(&self) -> bool {
        self.tasks.is_drained()
    }

    /// Live tasks, in id order.
    pub fn snapshot(&self, now: Instant) -> Vec<TaskView> {
        self.tasks.live().map(|t| TaskView::of(t, now)).collect()
    }

    /// Run one scheduling pass at `now`.
    pub fn tick<L>(&mut self, now: Instant, load: &mut L) -> TickReport
    where
        L: LoadSource + ?Sized,
    {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };
        self.reap(now, &mut report);
        self.check_timeouts(now, &mut report);
        self.admit(now, load, &mut report);
        self.escalate(now, &mut report);
        report
    }

    /// Stop the run: kill every live child, cancel every queued task.
    pub fn shutdown(&mut self, now: Instant) -> TickReport {
        self.canceled = true;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };
        for id in self.tasks.ids_where(|_| true) {
            let Some(pid) = self.tasks.get(id).and_then(Task::pid) else {
                self.finish(id, TaskState::Canceled, now, &mut report);
                continue;
            };
            if let Ok(Some(exit)) = self.control.try_reap(pid) {
                self.settle(id, exit, now, &mut report);
                if self.tasks.get(id).is_some_and(|t| t.state() == TaskState::Queued) {
                    self.finish(id, TaskState::Canceled, now, &mut report);
                }
                continue;
            }
            self.kill_group(id, pid);
            match self.control.try_reap(pid) {
                Ok(Some(exit)) => {
                    if let Some(task) = self.tasks.get_mut(id) {
                        task.exited(exit, now);
                    }
                }
                _ => self.control.release(pid),
            }
            self.finish(id, TaskState::Killed, now, &mut report);
        }
        report
    }

    /// Final per-task records, in id order.
    pub fn report(&self, now: Instant) -> RunReport {
        RunReport {
            ticks: self.ticks,
            canceled: self.canceled,
            tasks: self
                .tasks
                .all()
                .into_iter()
                .map(|t| TaskRecord::of(t, now))
                .collect(),
        }
    }

    fn reap(&mut self, now: Instant, report: &mut TickReport) {
        for id in self.tasks.ids_where(|t| t.state().holds_process()) {
            let Some(pid) = self.tasks.get(id).and_then(Task::pid) else {
                continue;
            };
            match self.control.try_reap(pid) {
                Ok(Some(exit)) => self.settle(id, exit, now, report),
                Ok(None) => {}
                Err(err) => self.abandon(id, pid, err, now, report),
            }
        }
    }

    fn check_timeouts(&mut self, now: Instant, report: &mut TickReport) {
        for id in self.tasks.ids_where(|t| t.is_overdue(now)) {
            self.begin_episode(id, EpisodeKind::TimingOut, now, report);
        }
    }

    fn admit<L>(&mut self, now: Instant, load: &mut L, report: &mut TickReport)
    where
        L: LoadSource + ?Sized,
    {
        let queued: Vec<QueuedTask> = self
            .tasks
            .queued()
            .map(|t| QueuedTask {
                id: t.id(),
                weight: t.weight(),
            })
            .collect();
        let running: Vec<RunningTask> = self
            .tasks
            .live()
            .filter(|t| t.state() == TaskState::Running)
            .filter_map(|t| {
                Some(RunningTask {
                    id: t.id(),
                    started_at: t.started_at()?,
                })
            })
            .collect();
        if queued.is_empty() && running.is_empty() {
            return;
        }

        let sample = match load.sample() {
            Ok(sample) => sample,
            Err(err) => {
                warn!(error = %err, "skipping admission for this tick");
                return;
            }
        };
        report.load = Some(sample);
        self.metrics.record_load_sample(sample);

        let live = self
            .tasks
            .live()
            .filter(|t| t.state().holds_process())
            .count();
        let pressure = load.pressure(live);
        report.pressure = Some(pressure);
        if pressure != Pressure::Clear {
            debug!(load = sample, %pressure, live, "admission gated by resource pressure");
        }
        let decision = self.admission.decide(&AdmissionInput {
            load: sample,
            queued: &queued,
            running: &running,
            live,
            pressure,
        });
        for id in decision.admit {
            self.start(id, now, report);
        }
        if let Some(victim) = decision.victim {
            info!(
                task = %victim,
                load = sample,
                threshold = self.config.threshold,
                %pressure,
                "system overloaded, stopping one task"
            );
            report.victim = Some(victim);
            self.begin_episode(victim, EpisodeKind::Yielding, now, report);
        }
    }

    fn escalate(&mut self, now: Instant, report: &mut TickReport) {
        for id in self.tasks.ids_where(|t| t.state().is_escalating()) {
            let Some(task) = self.tasks.get(id) else {
                continue;
            };
            let (Some(episode), Some(pid)) = (task.episode().copied(), task.pid()) else {
                continue;
            };
            let step = self
                .escalation
                .advance(&episode, pid, now, &mut self.control);
            self.apply_step(id, pid, episode, step, now, report);
        }
    }

    fn apply_step(
        &mut self,
        id: TaskId,
        pid: Pid,
        episode: Episode,
        step: Step,
        now: Instant,
        report: &mut TickReport,
    ) {
        match step {
            Step::Wait => {}
            Step::Exited(exit) => self.settle(id, exit, now, report),
            Step::Advanced { rung, sweep } => {
                let descendants = self.absorb_sweep(id, sweep);
                let Some(task) = self.tasks.get_mut(id) else {
                    return;
                };
                info!(
                    task = %id,
                    pid,
                    episode = %episode.kind,
                    rung = %rung,
                    descendants = descendants.len(),
                    "escalated"
                );
                task.enter_rung(rung, now, descendants);
                report.rung_changes.push(RungChange {
                    id,
                    from: episode.rung,
                    to: rung,
                });
            }
            Step::Reissued(sweep) => {
                let descendants = self.absorb_sweep(id, sweep);
                warn!(
                    task = %id,
                    pid,
                    attempt = episode.kill_attempts + 1,
                    "child survived SIGKILL, sending it again"
                );
                if let Some(task) = self.tasks.get_mut(id) {
                    task.reissue_kill(now, descendants);
                }
            }
            Step::Retry { error, sweep } => {
                self.absorb_sweep(id, sweep);
                warn!(task = %id, pid, rung = %episode.rung, error = %error, "will retry next tick");
                self.record_error(id, error);
            }
            Step::GaveUp => {
                error!(
                    task = %id,
                    pid,
                    attempts = episode.kill_attempts,
                    "child survived every SIGKILL, abandoning it"
                );
                self.control.release(pid);
                if let Some(task) = self.tasks.get_mut(id) {
                    task.mark_unreaped();
                }
                self.finish(id, TaskState::Killed, now, report);
            }
        }
    }

    fn start(&mut self, id: TaskId, now: Instant, report: &mut TickReport) {
        self.tasks.dequeue(id);
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        match self.control.spawn(id, task.label(), task.spec()) {
            Ok(pid) => {
                task.start(pid, now);
                self.metrics.record_task_started();
                info!(task = %id, label = task.label(), pid, attempt = task.attempts(), "task started");
                report.admitted.push(id);
                report.transitions.push(Transition {
                    id,
                    from: TaskState::Queued,
                    to: TaskState::Running,
                });
            }
            Err(err) => {
                warn!(task = %id, label = task.label(), error = %err, "task could not be started");
                self.record_error(id, err);
                self.finish(id, TaskState::Failed, now, report);
            }
        }
    }

    fn begin_episode(&mut self, id: TaskId, kind: EpisodeKind, now: Instant, report: &mut TickReport) {
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        let Some(pid) = task.pid() else {
            return;
        };
        let from = task.state();
        let signal = EscalationController::entry_signal(kind);
        match self.escalation.begin(kind, pid, &mut self.control) {
            Ok(delivery) => {
                if delivery == Delivery::Delivered {
                    self.metrics.record_signal(signal);
                }
                debug!(task = %id, pid, %signal, ?delivery, "entry signal sent");
            }
            Err(err) => {
                warn!(task = %id, pid, error = %err, "entry signal failed, entering the rung anyway");
                self.metrics.record_task_error(err.kind());
                task.record_error(err);
            }
        }
        task.begin_episode(kind, now);
        info!(task = %id, label = task.label(), pid, episode = %kind, "stop episode started");
        report.transitions.push(Transition {
            id,
            from,
            to: task.state(),
        });
        report.rung_changes.push(RungChange {
            id,
            from: Rung::None,
            to: kind.entry_rung(),
        });
    }

    /// Apply the exit of a task's direct child.
    fn settle(&mut self, id: TaskId, exit: ExitOutcome, now: Instant, report: &mut TickReport) {
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        let from = task.state();
        let Some(to) = state_after_exit(from, task.rung(), exit) else {
            return;
        };
        task.exited(exit, now);
        if to == TaskState::Queued {
            task.requeue();
            info!(task = %id, label = task.label(), %exit, "yielded task stopped, back in queue");
            self.tasks.enqueue(id);
            report.transitions.push(Transition { id, from, to });
        } else {
            self.finish(id, to, now, report);
        }
    }

    /// The child can no longer be observed: kill its group and fail the task.
    fn abandon(&mut self, id: TaskId, pid: Pid, err: TaskError, now: Instant, report: &mut TickReport) {
        error!(task = %id, pid, error = %err, "lost track of child, killing its process group");
        self.kill_group(id, pid);
        self.control.release(pid);
        self.record_error(id, err);
        self.finish(id, TaskState::Failed, now, report);
    }

    /// Best-effort SIGKILL to the child's process group and the child itself.
    fn kill_group(&mut self, id: TaskId, pid: Pid) {
        let group = self.control.signal_group(pid, SignalKind::Kill);
        let child = self.control.signal(pid, SignalKind::Kill);
        for result in [group, child] {
            match result {
                Ok(Delivery::Delivered) => self.metrics.record_signal(SignalKind::Kill),
                Ok(Delivery::AlreadyGone) => {}
                Err(err) => warn!(task = %id, pid, error = %err, "kill failed"),
            }
        }
    }

    /// Count the kills a sweep delivered and keep its descendant failures on the task.
    fn absorb_sweep(&mut self, id: TaskId, sweep: Sweep) -> Vec<Pid> {
        for _ in 0..sweep.signaled {
            self.metrics.record_signal(SignalKind::Kill);
        }
        for err in sweep.failures {
            warn!(task = %id, error = %err, "descendant could not be killed, escalating anyway");
            self.record_error(id, err);
        }
        sweep.descendants
    }

    fn record_error(&mut self, id: TaskId, err: TaskError) {
        self.metrics.record_task_error(err.kind());
        if let Some(task) = self.tasks.get_mut(id) {
            task.record_error(err);
        }
    }

    /// Move a task to a terminal state and out of the live set.
    fn finish(&mut self, id: TaskId, to: TaskState, now: Instant, report: &mut TickReport) {
        let Some(task) = self.tasks.get_mut(id) else {
            return;
        };
        let from = task.state();
        task.finish(to, now);
        let run_time = millis(task.run_time(now));
        if let Some(outcome) = TaskOutcome::from_state(to) {
            self.metrics.record_task_finished(outcome, run_time);
        }
        match task.exit() {
            Some(exit) => info!(task = %id, label = task.label(), state = %to, %exit, run_time_ms = run_time, "task finished"),
            None => info!(task = %id, label = task.label(), state = %to, run_time_ms = run_time, "task finished"),
        }
        self.tasks.retire(id);
        report.transitions.push(Transition { id, from, to });
    }
}

/// State a task moves to when its direct child exits, `None` if the task holds no child.
///
/// Once `KillingAll` was issued the exit is attributed to the kill, whatever the status.
/// A yielding child that exits earlier is re-queued whatever the status.
fn state_after_exit(state: TaskState, rung: Rung, exit: ExitOutcome) -> Option<TaskState> {
    let by_status = if exit.success() {
        TaskState::Completed
    } else {
        TaskState::Failed
    };
    match state {
        TaskState::Running => Some(by_status),
        TaskState::TimingOut | TaskState::Yielding if rung == Rung::KillingAll => {
            Some(TaskState::Killed)
        }
        TaskState::TimingOut => Some(by_status),
        TaskState::Yielding => Some(TaskState::Queued),
        _ => None,
    }
}
