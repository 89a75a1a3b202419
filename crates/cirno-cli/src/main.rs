//! `cirno`: run a task list under a load threshold.
//!
//! Exit status: 0 when every task completed, 1 when any task failed, was killed or
//! canceled, 2 when the configuration or task list is invalid.
mod args;
mod report;

use std::{process::ExitCode, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cirno_core::{LoadSource, RunReport, Scheduler, TaskView, TickReport};
use cirno_exec::{LoadAvgSource, ProcessTable, ResourceGate};
use cirno_model::{TaskState, read_task_list};
use cirno_observe::{init_local_offset, init_logger};
use cirno_prometheus::PrometheusMetrics;

use crate::args::Args;

const EXIT_TASKS_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();

    // 1) logger; the local offset must be read while the process is single-threaded
    init_local_offset();
    let logger = match args.logger_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("cirno: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if let Err(err) = init_logger(&logger) {
        eprintln!("cirno: {err}");
        return ExitCode::from(EXIT_CONFIG);
    }

    // 2) scheduler, process table, load source, metrics
    let prepared = match prepare(&args) {
        Ok(prepared) => prepared,
        Err(err) => {
            error!(error = %format!("{err:#}"), "invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // 3) run
    match run(&args, prepared) {
        Ok(report) if report.success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_TASKS_FAILED),
        Err(err) => {
            error!(error = %format!("{err:#}"), "run failed");
            ExitCode::from(EXIT_TASKS_FAILED)
        }
    }
}

struct Prepared {
    scheduler: Scheduler<ProcessTable>,
    load: Box<dyn LoadSource>,
    metrics: Option<PrometheusMetrics>,
}

fn prepare(args: &Args) -> anyhow::Result<Prepared> {
    let specs = read_task_list(&args.tasks, args.task_list_options())
        .with_context(|| format!("read task list {}", args.tasks.display()))?;
    if specs.is_empty() {
        warn!(path = %args.tasks.display(), "task list is empty");
    }

    let exec = args.exec_config();
    let load_avg = LoadAvgSource::from_config(&exec);
    let load: Box<dyn LoadSource> = match args.pressure_config() {
        Some(config) => {
            let gate = ResourceGate::new(load_avg, config).context("set up resource gate")?;
            let bands = gate.bands();
            info!(
                low_bytes = bands.low(),
                high_bytes = bands.high(),
                gpu_free_ratio = ?config.gpu_free_ratio,
                "resource gate enabled"
            );
            Box::new(gate)
        }
        None => Box::new(load_avg),
    };

    let table = ProcessTable::new(exec).context("prepare run directory")?;
    let mut scheduler = Scheduler::new(args.scheduler_config(), table)?;

    let metrics = match args.metrics_file {
        Some(_) => {
            let metrics = PrometheusMetrics::new().context("register metrics")?;
            scheduler = scheduler.with_metrics(Arc::new(metrics.clone()));
            Some(metrics)
        }
        None => None,
    };

    scheduler.submit_all(specs)?;
    Ok(Prepared {
        scheduler,
        load,
        metrics,
    })
}

fn run(args: &Args, prepared: Prepared) -> anyhow::Result<RunReport> {
    let Prepared {
        mut scheduler,
        mut load,
        metrics,
    } = prepared;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut progress = |report: &TickReport, tasks: &[TaskView]| log_progress(report, tasks);
    let end = runtime.block_on(scheduler.run(&mut *load, &cancel, &mut progress));

    let report = scheduler.report(Instant::now());
    info!(
        ?end,
        ticks = report.ticks,
        completed = report.count(TaskState::Completed),
        failed = report.count(TaskState::Failed),
        killed = report.count(TaskState::Killed),
        canceled = report.count(TaskState::Canceled),
        "run finished"
    );

    let run_dir = &scheduler.control().config().run_dir;
    let pairs = report::write_task_pairs(run_dir, &report)?;
    let json = report::write_json(run_dir, &report)?;
    info!(pairs = %pairs.display(), report = %json.display(), "report written");

    if let (Some(path), Some(metrics)) = (&args.metrics_file, metrics.as_ref()) {
        report::write_metrics(path, metrics)?;
        info!(path = %path.display(), "metrics written");
    }
    Ok(report)
}

fn log_progress(report: &TickReport, tasks: &[TaskView]) {
    let count = |pred: fn(TaskState) -> bool| tasks.iter().filter(|t| pred(t.state)).count();
    info!(
        tick = report.tick,
        load = ?report.load,
        pressure = ?report.pressure,
        remaining = tasks.len(),
        running = count(|s| s == TaskState::Running),
        escalating = count(|s| s.is_escalating()),
        queued = count(|s| s == TaskState::Queued),
        "progress"
    );
}
