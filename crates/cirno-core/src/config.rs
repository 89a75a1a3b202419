use std::time::Duration;

use cirno_model::{EpisodeKind, Weight};

use crate::error::CoreError;

/// Run-wide scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Load level above which no task is admitted and one running task may be evicted.
    pub threshold: f64,
    /// Interval between two scheduling passes.
    pub tick: Duration,
    /// Grace between rungs of a timeout episode.
    pub notify_grace: Duration,
    /// Grace between rungs of a load-shedding episode.
    pub stop_grace: Duration,
    /// Timeout applied to tasks that do not set their own.
    pub default_timeout: Option<Duration>,
    /// Weight applied to tasks that do not set their own.
    pub default_weight: Weight,
    /// Floor of live tasks admitted regardless of load; never evicted below it.
    pub min_running: usize,
    /// Cap on live tasks, `None` for unlimited.
    pub max_running: Option<usize>,
    /// Extra SIGKILL attempts at the top rung before the child is abandoned.
    pub kill_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            tick: Duration::from_secs(1),
            notify_grace: Duration::from_secs(5),
            stop_grace: Duration::from_secs(5),
            default_timeout: None,
            default_weight: 1.0,
            min_running: 0,
            max_running: None,
            kill_retries: 3,
        }
    }
}

impl SchedulerConfig {
    /// Grace period between rungs for the given episode kind.
    pub fn grace_for(&self, kind: EpisodeKind) -> Duration {
        match kind {
            EpisodeKind::TimingOut => self.notify_grace,
            EpisodeKind::Yielding => self.stop_grace,
        }
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(CoreError::Config(format!(
                "threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        if self.tick.is_zero() {
            return Err(CoreError::Config("tick interval must be non-zero".into()));
        }
        if !self.default_weight.is_finite() || self.default_weight < 0.0 {
            return Err(CoreError::Config(format!(
                "default weight must be a non-negative number, got {}",
                self.default_weight
            )));
        }
        match self.max_running {
            Some(0) => {
                return Err(CoreError::Config("max running must be at least 1".into()));
            }
            Some(max) if self.min_running > max => {
                return Err(CoreError::Config(format!(
                    "min running ({}) exceeds max running ({max})",
                    self.min_running
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Number of CPUs, the natural saturation point of the load average.
fn default_threshold() -> f64 {
    std::thread::available_parallelism()
        .map(|n| n.get() as f64)
        .unwrap_or(1.0)
}
