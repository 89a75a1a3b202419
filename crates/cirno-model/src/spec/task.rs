use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    ModelError, ModelResult,
    domain::{TimeoutMs, Weight},
};

/// Declarative description of one task to run.
///
/// `TaskSpec` says *what* to execute; the scheduler decides *when*.
/// Fields left as `None` fall back to the run-wide defaults of the scheduler configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Optional human-readable name used in logs, reports and output file names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Program to execute (e.g. `"sleep"`, `"/usr/bin/python3"`).
    pub command: String,
    /// Command-line arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Wall-clock budget for one run of the task, in milliseconds.
    ///
    /// `None` uses the scheduler default. `Some(0)` disables the timeout for this task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<TimeoutMs>,
    /// Cost charged against the load budget while the task holds a process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Weight>,
}

impl TaskSpec {
    /// Create a spec for `command` with no arguments and default policies.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            name: None,
            command: command.into(),
            args: Vec::new(),
            timeout_ms: None,
            weight: None,
        }
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the timeout for this task.
    ///
    /// Fractions of a millisecond round up, so only [`Duration::ZERO`] means "no timeout".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = Some(TimeoutMs::try_from(ms).unwrap_or(TimeoutMs::MAX));
        self
    }

    /// Override the admission weight for this task.
    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Resolve the effective timeout against a run-wide default.
    ///
    /// An explicit `0` means "no timeout" even when the default sets one.
    pub fn effective_timeout(&self, default: Option<Duration>) -> Option<Duration> {
        match self.timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => default,
        }
    }

    /// Resolve the effective weight against a run-wide default.
    pub fn effective_weight(&self, default: Weight) -> Weight {
        self.weight.unwrap_or(default)
    }

    /// Full command line as a single string, used in reports.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    /// Validate the spec before it is handed to the scheduler.
    ///
    /// Rules:
    /// - `command` is not empty or whitespace-only;
    /// - `weight`, when set, is finite and not negative;
    /// - `name`, when set, is not empty and contains no path separators.
    pub fn validate(&self) -> ModelResult<()> {
        if self.command.trim().is_empty() {
            return Err(ModelError::Invalid("command is empty".into()));
        }
        if let Some(w) = self.weight {
            if !w.is_finite() || w < 0.0 {
                return Err(ModelError::InvalidWeight(w.to_string()));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ModelError::Invalid("name is empty".into()));
            }
            if name.contains('/') {
                return Err(ModelError::Invalid(format!(
                    "name '{name}' must not contain '/'"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}: {}", self.command_line()),
            None => f.write_str(&self.command_line()),
        }
    }
}
