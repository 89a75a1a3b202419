//! Child processes backed by `tokio::process`.
mod output;
mod signal;

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use cirno_core::{Delivery, ExitOutcome, Pid, ProcessControl, TaskError};
use cirno_model::{SignalKind, TaskId, TaskSpec};

use crate::{ExecConfig, ExecError, utils};

/// Children spawned for the scheduler, keyed by pid.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct ProcessTable {
    config: ExecConfig,
    children: HashMap<Pid, Child>,
}

impl ProcessTable {
    /// Create the table and its run directory.
    pub fn new(config: ExecConfig) -> Result<Self, ExecError> {
        if config.run_dir.as_os_str().is_empty() {
            return Err(ExecError::InvalidConfig("run directory is empty".into()));
        }
        std::fs::create_dir_all(&config.run_dir)?;
        Ok(Self {
            config,
            children: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Number of children not yet reaped or released.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn command(&self, label: &str, spec: &TaskSpec) -> std::io::Result<Command> {
        let out = output::open(&self.config.output_path(label))?;
        let err = if self.config.capture_stderr {
            Stdio::from(out.try_clone()?)
        } else {
            Stdio::inherit()
        };

        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(err);
        #[cfg(unix)]
        cmd.process_group(0);
        Ok(cmd)
    }
}

impl ProcessControl for ProcessTable {
    fn spawn(&mut self, id: TaskId, label: &str, spec: &TaskSpec) -> Result<Pid, TaskError> {
        trace!(task = %id, command = %spec.command, args = ?spec.args, "spawning child");
        let mut cmd = self.command(label, spec).map_err(|e| TaskError::Spawn {
            reason: format!("cannot open output file: {e}"),
        })?;
        let child = cmd.spawn().map_err(|e| TaskError::Spawn {
            reason: format!("{}: {e}", spec.command),
        })?;
        let pid = child.id().ok_or_else(|| TaskError::Spawn {
            reason: "child exited before its pid was read".into(),
        })?;
        debug!(task = %id, label, pid, "child spawned");
        self.children.insert(pid, child);
        Ok(pid)
    }

    fn try_reap(&mut self, pid: Pid) -> Result<Option<ExitOutcome>, TaskError> {
        let child = self.children.get_mut(&pid).ok_or_else(|| TaskError::Reap {
            pid,
            reason: "not a child of this table".into(),
        })?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.children.remove(&pid);
                let exit = exit_outcome(status);
                trace!(pid, %exit, "child reaped");
                Ok(Some(exit))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(TaskError::Reap {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    fn signal(&mut self, pid: Pid, signal: SignalKind) -> Result<Delivery, TaskError> {
        signal::kill(pid, signal).map_err(|e| TaskError::Signal {
            pid,
            signal,
            reason: e.to_string(),
        })
    }

    fn signal_group(&mut self, pgid: Pid, signal: SignalKind) -> Result<Delivery, TaskError> {
        signal::killpg(pgid, signal).map_err(|e| TaskError::Signal {
            pid: pgid,
            signal,
            reason: e.to_string(),
        })
    }

    fn descendants(&mut self, pid: Pid) -> Result<Vec<Pid>, TaskError> {
        utils::descendants(pid).map_err(|e| TaskError::Discovery {
            pid,
            reason: e.to_string(),
        })
    }

    fn release(&mut self, pid: Pid) {
        // Dropping the handle leaves the zombie to tokio's orphan reaper.
        if self.children.remove(&pid).is_some() {
            warn!(pid, "child released without being reaped");
        }
    }
}

fn exit_outcome(status: ExitStatus) -> ExitOutcome {
    if let Some(code) = status.code() {
        return ExitOutcome::exited(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitOutcome::signaled(signal);
        }
    }
    ExitOutcome {
        code: None,
        signal: None,
    }
}
