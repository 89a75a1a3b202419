use std::{path::PathBuf, time::Duration};

use clap::Parser;

use cirno_core::SchedulerConfig;
use cirno_exec::{ExecConfig, LoadWindow, PressureConfig};
use cirno_model::TaskListOptions;
use cirno_observe::{LoggerConfig, LoggerFormat, LoggerLevel, LoggerResult, LoggerTimeZone};

const MIB: u64 = 1 << 20;

/// Run a list of commands, admitting them as system load allows.
#[derive(Parser, Debug)]
#[command(name = "cirno", version, about)]
pub struct Args {
    /// Task list file, one command per line.
    #[arg(env = "CIRNO_TASKS")]
    pub tasks: PathBuf,

    /// Load above which tasks are shed. Defaults to the number of CPUs.
    #[arg(long, env = "CIRNO_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Scheduling tick in milliseconds.
    #[arg(long, env = "CIRNO_TICK_MS", default_value_t = 1_000)]
    pub tick_ms: u64,

    /// Grace after SIGALRM before descendants are killed.
    #[arg(long, env = "CIRNO_NOTIFY_GRACE_MS", default_value_t = 5_000)]
    pub notify_grace_ms: u64,

    /// Grace after SIGTERM before descendants are killed.
    #[arg(long, env = "CIRNO_STOP_GRACE_MS", default_value_t = 5_000)]
    pub stop_grace_ms: u64,

    /// Timeout for tasks without an @timeout option. No timeout when unset.
    #[arg(long, env = "CIRNO_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Weight for tasks without an @weight option.
    #[arg(long, env = "CIRNO_WEIGHT", default_value_t = 1.0)]
    pub weight: f64,

    /// Keep at least this many tasks running regardless of load.
    #[arg(long, env = "CIRNO_MIN_RUNNING", default_value_t = 0)]
    pub min_running: usize,

    /// Never run more than this many tasks at once.
    #[arg(long, env = "CIRNO_MAX_RUNNING")]
    pub max_running: Option<usize>,

    /// SIGKILL re-issues before an unkillable child is abandoned.
    #[arg(long, env = "CIRNO_KILL_RETRIES", default_value_t = 3)]
    pub kill_retries: u32,

    /// First word of every task line is the task name.
    #[arg(long, env = "CIRNO_WITH_NAME")]
    pub with_name: bool,

    /// Directory for task output logs and the final report.
    #[arg(long, env = "CIRNO_RUN_DIR", default_value = "cirno-run")]
    pub run_dir: PathBuf,

    /// Load average window: 1m, 5m or 15m.
    #[arg(long, env = "CIRNO_LOAD_WINDOW", default_value = "5m")]
    pub load_window: LoadWindow,

    /// Divide the load average by the number of CPUs before comparing it to the threshold.
    #[arg(long, env = "CIRNO_PER_CPU_LOAD")]
    pub per_cpu_load: bool,

    /// Gate admission on memory use too.
    #[arg(long, env = "CIRNO_MEMORY_GUARD")]
    pub memory_guard: bool,

    /// Share of total memory above which one task is stopped.
    #[arg(long, env = "CIRNO_HIGH_MEM", default_value_t = 0.9)]
    pub high_mem: f64,

    /// Share of total memory up to which tasks are admitted.
    #[arg(long, env = "CIRNO_LOW_MEM", default_value_t = 0.75)]
    pub low_mem: f64,

    /// Memory a new task is expected to take at least, in MiB.
    #[arg(long, env = "CIRNO_PER_TASK_MEM_MIB", default_value_t = 0)]
    pub per_task_mem_mib: u64,

    /// Memory kept away from tasks, in MiB.
    #[arg(long, env = "CIRNO_RESERVED_MEM_MIB", default_value_t = 0)]
    pub reserved_mem_mib: u64,

    /// Admit only while some GPU has this share of its memory free. Needs `nvidia-smi`.
    #[arg(long, env = "CIRNO_GPU_FREE_RATIO")]
    pub gpu_free_ratio: Option<f64>,

    /// Append task stderr to the task log too.
    #[arg(long, env = "CIRNO_CAPTURE_STDERR")]
    pub capture_stderr: bool,

    /// Log filter, e.g. `info` or `cirno_core=debug,info`.
    #[arg(long, env = "CIRNO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output: text, json or journald.
    #[arg(long, env = "CIRNO_LOG_FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,

    /// Timestamp timezone: utc or local.
    #[arg(long, env = "CIRNO_LOG_TZ", default_value = "utc")]
    pub log_tz: LoggerTimeZone,

    /// Write Prometheus text metrics here when the run ends.
    #[arg(long, env = "CIRNO_METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,
}

impl Args {
    pub fn logger_config(&self) -> LoggerResult<LoggerConfig> {
        Ok(LoggerConfig {
            format: self.log_format,
            level: LoggerLevel::new(&self.log_level)?,
            tz: self.log_tz,
            ..Default::default()
        })
    }

    /// Scheduler settings. Validation happens in `Scheduler::new`.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            tick: Duration::from_millis(self.tick_ms),
            notify_grace: Duration::from_millis(self.notify_grace_ms),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
            default_timeout: self.timeout_ms.map(Duration::from_millis),
            default_weight: self.weight,
            min_running: self.min_running,
            max_running: self.max_running,
            kill_retries: self.kill_retries,
        }
    }

    pub fn exec_config(&self) -> ExecConfig {
        ExecConfig {
            capture_stderr: self.capture_stderr,
            load_window: self.load_window,
            per_cpu_load: self.per_cpu_load,
            ..ExecConfig::new(&self.run_dir)
        }
    }

    /// Resource gate settings, `None` when neither memory nor GPU gating is asked for.
    pub fn pressure_config(&self) -> Option<PressureConfig> {
        if !self.memory_guard && self.gpu_free_ratio.is_none() {
            return None;
        }
        // Without the memory guard the bands cover all memory and never gate.
        let (low, high) = if self.memory_guard {
            (self.low_mem, self.high_mem)
        } else {
            (1.0, 1.0)
        };
        Some(PressureConfig {
            high_mem_ratio: high,
            low_mem_ratio: low,
            per_task_mem: self.per_task_mem_mib.saturating_mul(MIB),
            reserved_mem: self.reserved_mem_mib.saturating_mul(MIB),
            gpu_free_ratio: self.gpu_free_ratio,
        })
    }

    pub fn task_list_options(&self) -> TaskListOptions {
        TaskListOptions {
            with_name: self.with_name,
        }
    }
}
