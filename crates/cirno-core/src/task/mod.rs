mod set;
pub use set::TaskSet;

use std::time::{Duration, Instant};

use cirno_model::{EpisodeKind, Rung, TaskId, TaskSpec, TaskState, Weight};

use crate::config::SchedulerConfig;
use crate::control::{ExitOutcome, Pid};
use crate::error::TaskError;

/// Live child process owned by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    /// Pid of the direct child, also its process group id.
    pub pid: Pid,
    pub started_at: Instant,
    /// Descendants found at the latest kill rung.
    pub descendants: Vec<Pid>,
}

impl ProcessHandle {
    fn new(pid: Pid, started_at: Instant) -> Self {
        Self {
            pid,
            started_at,
            descendants: Vec::new(),
        }
    }
}

/// Stop episode in progress on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Episode {
    pub kind: EpisodeKind,
    pub rung: Rung,
    /// When the current rung was entered (or last re-issued at the top rung).
    pub entered_at: Instant,
    /// SIGKILL re-issues at [`Rung::KillingAll`].
    pub kill_attempts: u32,
}

impl Episode {
    pub fn begin(kind: EpisodeKind, now: Instant) -> Self {
        Self {
            kind,
            rung: kind.entry_rung(),
            entered_at: now,
            kill_attempts: 0,
        }
    }

    /// Time spent on the current rung.
    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }
}

/// A submitted task and its runtime state.
///
/// Only the scheduler mutates a task; everything public here is read-only.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    label: String,
    spec: TaskSpec,
    timeout: Option<Duration>,
    weight: Weight,

    state: TaskState,
    handle: Option<ProcessHandle>,
    episode: Option<Episode>,
    attempts: u32,
    timed_out: bool,
    unreaped: bool,
    exit: Option<ExitOutcome>,
    errors: Vec<TaskError>,
    run_time: Duration,
}

impl Task {
    pub(crate) fn new(id: TaskId, spec: TaskSpec, config: &SchedulerConfig) -> Self {
        let label = spec.name.clone().unwrap_or_else(|| id.to_string());
        let timeout = spec.effective_timeout(config.default_timeout);
        let weight = spec.effective_weight(config.default_weight);
        Self {
            id,
            label,
            spec,
            timeout,
            weight,
            state: TaskState::Queued,
            handle: None,
            episode: None,
            attempts: 0,
            timed_out: false,
            unreaped: false,
            exit: None,
            errors: Vec::new(),
            run_time: Duration::ZERO,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Task name, or `task-<id>` for unnamed tasks.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// Resolved timeout, `None` when the task never times out.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolved admission weight.
    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn handle(&self) -> Option<&ProcessHandle> {
        self.handle.as_ref()
    }

    pub fn pid(&self) -> Option<Pid> {
        self.handle.as_ref().map(|h| h.pid)
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.handle.as_ref().map(|h| h.started_at)
    }

    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    pub fn rung(&self) -> Rung {
        self.episode.map(|e| e.rung).unwrap_or_default()
    }

    /// Number of times a child was spawned for this task.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` once the task has entered a timeout episode.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// `true` when the child survived every SIGKILL and was abandoned.
    pub fn unreaped(&self) -> bool {
        self.unreaped
    }

    /// Exit status of the latest child, if it was reaped.
    pub fn exit(&self) -> Option<ExitOutcome> {
        self.exit
    }

    pub fn errors(&self) -> &[TaskError] {
        &self.errors
    }

    /// Time spent holding a process, summed over all attempts up to `now`.
    pub fn run_time(&self, now: Instant) -> Duration {
        let current = self
            .handle
            .as_ref()
            .map(|h| now.saturating_duration_since(h.started_at))
            .unwrap_or_default();
        self.run_time + current
    }

    /// `true` when a running task has used up its timeout at `now`.
    pub fn is_overdue(&self, now: Instant) -> bool {
        match (self.state, self.timeout, &self.handle) {
            (TaskState::Running, Some(timeout), Some(handle)) => {
                now.saturating_duration_since(handle.started_at) >= timeout
            }
            _ => false,
        }
    }

    pub(crate) fn start(&mut self, pid: Pid, now: Instant) {
        self.state = TaskState::Running;
        self.handle = Some(ProcessHandle::new(pid, now));
        self.episode = None;
        self.exit = None;
        self.attempts += 1;
    }

    pub(crate) fn begin_episode(&mut self, kind: EpisodeKind, now: Instant) {
        self.state = match kind {
            EpisodeKind::TimingOut => TaskState::TimingOut,
            EpisodeKind::Yielding => TaskState::Yielding,
        };
        if kind == EpisodeKind::TimingOut {
            self.timed_out = true;
        }
        self.episode = Some(Episode::begin(kind, now));
    }

    /// Move the episode one rung up. Rungs never move backwards.
    pub(crate) fn enter_rung(&mut self, rung: Rung, now: Instant, descendants: Vec<Pid>) {
        if let Some(episode) = self.episode.as_mut() {
            debug_assert!(rung > episode.rung, "rungs only advance forward");
            episode.rung = rung;
            episode.entered_at = now;
        }
        self.note_kill(descendants);
    }

    /// Count a SIGKILL re-issue at the top rung.
    pub(crate) fn reissue_kill(&mut self, now: Instant, descendants: Vec<Pid>) {
        if let Some(episode) = self.episode.as_mut() {
            episode.kill_attempts += 1;
            episode.entered_at = now;
        }
        self.note_kill(descendants);
    }

    fn note_kill(&mut self, descendants: Vec<Pid>) {
        if let Some(handle) = self.handle.as_mut() {
            handle.descendants = descendants;
        }
    }

    /// Drop the process handle; the pid is never signaled through this task again.
    pub(crate) fn release_handle(&mut self, now: Instant) -> Option<ProcessHandle> {
        let handle = self.handle.take()?;
        self.run_time += now.saturating_duration_since(handle.started_at);
        Some(handle)
    }

    pub(crate) fn exited(&mut self, exit: ExitOutcome, now: Instant) {
        self.release_handle(now);
        self.exit = Some(exit);
    }

    /// Back to the queue after yielding.
    pub(crate) fn requeue(&mut self) {
        debug_assert!(self.handle.is_none());
        self.state = TaskState::Queued;
        self.episode = None;
    }

    pub(crate) fn finish(&mut self, state: TaskState, now: Instant) {
        debug_assert!(state.is_terminal());
        self.release_handle(now);
        self.state = state;
        self.episode = None;
    }

    pub(crate) fn mark_unreaped(&mut self) {
        self.unreaped = true;
    }

    pub(crate) fn record_error(&mut self, error: TaskError) {
        self.errors.push(error);
    }
}
