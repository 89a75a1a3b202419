//! In-memory stand-ins for the OS, used by the scheduler tests.
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use cirno_model::{SignalKind, TaskId, TaskSpec};

use crate::control::{Delivery, ExitOutcome, Pid, ProcessControl};
use crate::error::{CoreError, TaskError};
use crate::load::{LoadSource, Pressure};
use crate::metrics::{MetricsBackend, TaskOutcome};

/// How a fake process reacts to signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Ignores notify and stop, dies on kill.
    Stubborn,
    /// Exits with the code on notify.
    ExitOnNotify(i32),
    /// Dies on stop.
    ExitOnStop,
    /// Survives everything.
    Unkillable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sent {
    pub pid: Pid,
    pub signal: SignalKind,
    pub group: bool,
}

#[derive(Debug)]
struct FakeProc {
    behavior: Behavior,
    parent: Option<Pid>,
    group: Pid,
    exit: Option<ExitOutcome>,
    reaped: bool,
}

impl FakeProc {
    fn alive(&self) -> bool {
        self.exit.is_none()
    }

    fn deliver(&mut self, signal: SignalKind) {
        if !self.alive() {
            return;
        }
        let exit = match (signal, self.behavior) {
            (_, Behavior::Unkillable) => None,
            (SignalKind::Kill, _) => Some(ExitOutcome::signaled(9)),
            (SignalKind::Stop, Behavior::ExitOnStop) => Some(ExitOutcome::signaled(15)),
            (SignalKind::Notify, Behavior::ExitOnNotify(code)) => Some(ExitOutcome::exited(code)),
            _ => None,
        };
        if exit.is_some() {
            self.exit = exit;
            // Only direct children wait for the scheduler to reap them.
            if self.parent.is_some() {
                self.reaped = true;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeControl {
    next_pid: Pid,
    procs: BTreeMap<Pid, FakeProc>,
    behaviors: HashMap<String, Behavior>,
    failing_spawns: HashSet<String>,
    spawned: Vec<(TaskId, Pid)>,
    pub sent: Vec<Sent>,
    pub failing_signals: HashSet<Pid>,
    pub failing_reaps: HashSet<Pid>,
    pub failing_discovery: bool,
    pub released: Vec<Pid>,
}

impl Default for FakeControl {
    fn default() -> Self {
        Self {
            next_pid: 100,
            procs: BTreeMap::new(),
            behaviors: HashMap::new(),
            failing_spawns: HashSet::new(),
            spawned: Vec::new(),
            sent: Vec::new(),
            failing_signals: HashSet::new(),
            failing_reaps: HashSet::new(),
            failing_discovery: false,
            released: Vec::new(),
        }
    }
}

impl FakeControl {
    /// Processes started for `command` react with `behavior`.
    pub fn with_behavior(mut self, command: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(command.to_string(), behavior);
        self
    }

    /// Spawning `command` fails.
    pub fn with_failing_spawn(mut self, command: &str) -> Self {
        self.failing_spawns.insert(command.to_string());
        self
    }

    fn alloc(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    /// Start a stubborn grandchild under `parent`, in the same process group.
    pub fn fork(&mut self, parent: Pid) -> Pid {
        let group = self.procs.get(&parent).map(|p| p.group).unwrap_or(parent);
        let pid = self.alloc();
        self.procs.insert(
            pid,
            FakeProc {
                behavior: Behavior::Stubborn,
                parent: Some(parent),
                group,
                exit: None,
                reaped: false,
            },
        );
        pid
    }

    /// Make the process exit on its own.
    pub fn exit(&mut self, pid: Pid, code: i32) {
        if let Some(proc) = self.procs.get_mut(&pid) {
            if proc.alive() {
                proc.exit = Some(ExitOutcome::exited(code));
            }
        }
    }

    pub fn is_alive(&self, pid: Pid) -> bool {
        self.procs.get(&pid).is_some_and(FakeProc::alive)
    }

    /// Pids spawned for `id`, oldest first.
    pub fn pids_of(&self, id: TaskId) -> Vec<Pid> {
        self.spawned
            .iter()
            .filter(|(task, _)| *task == id)
            .map(|(_, pid)| *pid)
            .collect()
    }

    /// Latest pid spawned for `id`.
    pub fn pid_of(&self, id: TaskId) -> Pid {
        self.pids_of(id).last().copied().unwrap_or_default()
    }

    /// Signals sent to `pid`, directly or through its group.
    pub fn signals_to(&self, pid: Pid) -> Vec<SignalKind> {
        self.sent
            .iter()
            .filter(|s| s.pid == pid)
            .map(|s| s.signal)
            .collect()
    }

    pub fn kills(&self) -> usize {
        self.sent
            .iter()
            .filter(|s| s.signal == SignalKind::Kill)
            .count()
    }
}

impl ProcessControl for FakeControl {
    fn spawn(&mut self, id: TaskId, _label: &str, spec: &TaskSpec) -> Result<Pid, TaskError> {
        if self.failing_spawns.contains(&spec.command) {
            return Err(TaskError::Spawn {
                reason: format!("{}: no such file or directory", spec.command),
            });
        }
        let behavior = self
            .behaviors
            .get(&spec.command)
            .copied()
            .unwrap_or(Behavior::Stubborn);
        let pid = self.alloc();
        self.procs.insert(
            pid,
            FakeProc {
                behavior,
                parent: None,
                group: pid,
                exit: None,
                reaped: false,
            },
        );
        self.spawned.push((id, pid));
        Ok(pid)
    }

    fn try_reap(&mut self, pid: Pid) -> Result<Option<ExitOutcome>, TaskError> {
        let failing = self.failing_reaps.contains(&pid);
        match self.procs.get_mut(&pid) {
            Some(proc) if !failing && !proc.reaped => {
                let exit = proc.exit;
                proc.reaped = exit.is_some();
                Ok(exit)
            }
            _ => Err(TaskError::Reap {
                pid,
                reason: "no such child".into(),
            }),
        }
    }

    fn signal(&mut self, pid: Pid, signal: SignalKind) -> Result<Delivery, TaskError> {
        if self.failing_signals.contains(&pid) {
            return Err(TaskError::Signal {
                pid,
                signal,
                reason: "operation not permitted".into(),
            });
        }
        self.sent.push(Sent {
            pid,
            signal,
            group: false,
        });
        match self.procs.get_mut(&pid) {
            Some(proc) if !proc.reaped => {
                proc.deliver(signal);
                Ok(Delivery::Delivered)
            }
            _ => Ok(Delivery::AlreadyGone),
        }
    }

    fn signal_group(&mut self, pgid: Pid, signal: SignalKind) -> Result<Delivery, TaskError> {
        if self.failing_signals.contains(&pgid) {
            return Err(TaskError::Signal {
                pid: pgid,
                signal,
                reason: "operation not permitted".into(),
            });
        }
        self.sent.push(Sent {
            pid: pgid,
            signal,
            group: true,
        });
        let mut delivered = false;
        for proc in self.procs.values_mut() {
            if proc.group == pgid && !proc.reaped {
                proc.deliver(signal);
                delivered = true;
            }
        }
        Ok(if delivered {
            Delivery::Delivered
        } else {
            Delivery::AlreadyGone
        })
    }

    fn descendants(&mut self, pid: Pid) -> Result<Vec<Pid>, TaskError> {
        if self.failing_discovery {
            return Err(TaskError::Discovery {
                pid,
                reason: "proc unavailable".into(),
            });
        }
        let mut found = Vec::new();
        let mut frontier = VecDeque::from([pid]);
        while let Some(parent) = frontier.pop_front() {
            for (child, proc) in &self.procs {
                if proc.parent == Some(parent) && proc.alive() {
                    found.push(*child);
                    frontier.push_back(*child);
                }
            }
        }
        Ok(found)
    }

    fn release(&mut self, pid: Pid) {
        self.released.push(pid);
    }
}

/// Load source replaying a script, then repeating the last value.
#[derive(Debug)]
pub(crate) struct ScriptedLoad {
    script: VecDeque<Option<f64>>,
    last: f64,
    /// Band reported after every sample.
    pub pressure: Pressure,
    pub samples: usize,
}

impl ScriptedLoad {
    pub fn constant(load: f64) -> Self {
        Self::script(&[Some(load)])
    }

    /// `None` entries make the sample fail.
    pub fn script(script: &[Option<f64>]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            last: 0.0,
            pressure: Pressure::Clear,
            samples: 0,
        }
    }

}

impl LoadSource for ScriptedLoad {
    fn sample(&mut self) -> Result<f64, CoreError> {
        self.samples += 1;
        match self.script.pop_front() {
            Some(Some(load)) => {
                self.last = load;
                Ok(load)
            }
            Some(None) => Err(CoreError::Load("scripted failure".into())),
            None => Ok(self.last),
        }
    }

    fn pressure(&mut self, _live: usize) -> Pressure {
        self.pressure
    }
}

/// Metrics backend keeping the signals and errors it was told about.
#[derive(Debug, Default)]
pub(crate) struct RecordingMetrics {
    signals: Mutex<Vec<SignalKind>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingMetrics {
    pub fn signals(&self) -> Vec<SignalKind> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl MetricsBackend for RecordingMetrics {
    fn record_task_started(&self) {}

    fn record_task_finished(&self, _: TaskOutcome, _: u64) {}

    fn record_signal(&self, signal: SignalKind) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push(signal);
        }
    }

    fn record_task_error(&self, error_kind: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error_kind.to_string());
        }
    }

    fn record_load_sample(&self, _: f64) {}
}
