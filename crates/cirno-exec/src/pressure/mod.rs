//! Resource gate layered over a load source.
//!
//! [`ResourceGate`] forwards load samples untouched and answers the pressure question from
//! memory use: the memory in use now plus what one more task is expected to take is
//! compared against two bands.
//!
//! ```text
//! predicted <= low          -> Clear   admit as load allows
//! low < predicted <= high   -> Hold    keep the running set as it is
//! predicted > high          -> Shed    stop one task
//! ```
//!
//! With a GPU ratio set, a `Clear` answer turns into `Hold` unless some card has enough
//! free memory.
mod gpu;
pub use gpu::{GpuCard, has_free_card, query_nvidia};

mod memory;
pub use memory::{MemoryBands, per_task_estimate};

use sysinfo::System;
use tracing::{trace, warn};

use cirno_core::{CoreError, LoadSource, Pressure};

use crate::ExecError;

/// Settings for the memory and GPU gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureConfig {
    /// Predicted use above this share of total memory sheds load.
    pub high_mem_ratio: f64,
    /// Predicted use at or below this share of total memory admits freely.
    pub low_mem_ratio: f64,
    /// Smallest amount of memory a new task is expected to take, in bytes.
    pub per_task_mem: u64,
    /// Memory never handed to tasks, in bytes.
    pub reserved_mem: u64,
    /// Hold admission unless some GPU has at least this share of its memory free.
    pub gpu_free_ratio: Option<f64>,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            high_mem_ratio: 0.9,
            low_mem_ratio: 0.75,
            per_task_mem: 0,
            reserved_mem: 0,
            gpu_free_ratio: None,
        }
    }
}

impl PressureConfig {
    pub fn validate(&self) -> Result<(), ExecError> {
        let ratios = [
            ("high memory ratio", Some(self.high_mem_ratio)),
            ("low memory ratio", Some(self.low_mem_ratio)),
            ("gpu free ratio", self.gpu_free_ratio),
        ];
        for (what, ratio) in ratios {
            if let Some(r) = ratio {
                if !(0.0..=1.0).contains(&r) {
                    return Err(ExecError::InvalidConfig(format!(
                        "{what} must be within 0..=1, got {r}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Load source that also reports memory and GPU pressure.
pub struct ResourceGate<L> {
    inner: L,
    config: PressureConfig,
    bands: MemoryBands,
    system: System,
}

impl<L: LoadSource> ResourceGate<L> {
    pub fn new(inner: L, config: PressureConfig) -> Result<Self, ExecError> {
        config.validate()?;
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(ExecError::InvalidConfig(
                "total memory is unknown on this host".into(),
            ));
        }
        let bands = MemoryBands::new(total, &config);
        trace!(total, low = bands.low(), high = bands.high(), "memory bands");
        Ok(Self {
            inner,
            config,
            bands,
            system,
        })
    }

    pub fn bands(&self) -> MemoryBands {
        self.bands
    }

    fn memory_pressure(&mut self, live: usize) -> Pressure {
        self.system.refresh_memory();
        let rss = memory::tree_rss(&mut self.system, std::process::id());
        let per_task = per_task_estimate(rss, live, self.config.per_task_mem);
        let used = self.system.used_memory();
        let predicted = used.saturating_add(per_task);
        let pressure = self.bands.classify(predicted);
        trace!(used, per_task, predicted, %pressure, "memory pressure");
        pressure
    }
}

fn gpu_pressure(ratio: f64) -> Pressure {
    match query_nvidia() {
        Ok(cards) if has_free_card(&cards, ratio) => Pressure::Clear,
        Ok(cards) => {
            trace!(cards = cards.len(), ratio, "no gpu with enough free memory");
            Pressure::Hold
        }
        Err(err) => {
            warn!(error = %err, "gpu query failed, holding admission");
            Pressure::Hold
        }
    }
}

impl<L: LoadSource> LoadSource for ResourceGate<L> {
    fn sample(&mut self) -> Result<f64, CoreError> {
        self.inner.sample()
    }

    fn pressure(&mut self, live: usize) -> Pressure {
        let pressure = self.inner.pressure(live).max(self.memory_pressure(live));
        match self.config.gpu_free_ratio {
            Some(ratio) if pressure == Pressure::Clear => gpu_pressure(ratio),
            _ => pressure,
        }
    }
}
