//! Memory bands and per-task memory estimates.
use sysinfo::System;
use tracing::debug;

use cirno_core::{Pid, Pressure};

use crate::pressure::PressureConfig;
use crate::utils::descendants;

/// Absolute memory limits, in bytes, derived once from the total at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBands {
    low: u64,
    high: u64,
}

impl MemoryBands {
    /// `high` never eats into the reserved memory, and `low` never exceeds `high`.
    pub fn new(total: u64, config: &PressureConfig) -> Self {
        let high = share(total, config.high_mem_ratio)
            .min(total.saturating_sub(config.reserved_mem));
        let low = share(total, config.low_mem_ratio).min(high);
        Self { low, high }
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    /// Band for the memory use predicted after one more task starts.
    pub fn classify(&self, predicted: u64) -> Pressure {
        if predicted <= self.low {
            Pressure::Clear
        } else if predicted > self.high {
            Pressure::Shed
        } else {
            Pressure::Hold
        }
    }
}

fn share(total: u64, ratio: f64) -> u64 {
    (total as f64 * ratio) as u64
}

/// Memory one more task is expected to take: the average resident size of the running
/// tasks, never below the configured floor.
pub fn per_task_estimate(tree_rss: u64, live: usize, floor: u64) -> u64 {
    let observed = match live {
        0 => 0,
        n => tree_rss / n as u64,
    };
    observed.max(floor)
}

/// Resident memory of every descendant of `root`, in bytes.
///
/// Processes that exit during the walk count as zero.
pub(crate) fn tree_rss(system: &mut System, root: Pid) -> u64 {
    let pids = match descendants(root) {
        Ok(pids) => pids,
        Err(err) => {
            debug!(root, error = %err, "process tree unavailable, assuming no task memory");
            return 0;
        }
    };
    pids.into_iter().map(|pid| process_rss(system, pid)).sum()
}

fn process_rss(system: &mut System, pid: Pid) -> u64 {
    let pid = sysinfo::Pid::from_u32(pid);
    if !system.refresh_process(pid) {
        return 0;
    }
    system.process(pid).map_or(0, sysinfo::Process::memory)
}
