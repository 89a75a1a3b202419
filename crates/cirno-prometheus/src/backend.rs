use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use cirno_core::{MetricsBackend, TaskOutcome};
use cirno_model::SignalKind;

const NAMESPACE: &str = "cirno";

/// Prometheus-backed [`MetricsBackend`].
///
/// All labels are bounded: `outcome` has four values, `signal` three, `kind` four.
#[derive(Clone)]
pub struct PrometheusMetrics {
    tasks_started: IntCounter,
    tasks_finished: CounterVec,
    run_time: Histogram,
    signals: CounterVec,
    errors: CounterVec,
    load: Gauge,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create the backend and register its metrics in `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let tasks_started = IntCounter::with_opts(
            Opts::new("tasks_started_total", "Child processes spawned").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(tasks_started.clone()))?;

        let tasks_finished = CounterVec::new(
            Opts::new("tasks_finished_total", "Tasks that reached a terminal state")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(tasks_finished.clone()))?;

        let run_time = Histogram::with_opts(
            HistogramOpts::new(
                "task_run_seconds",
                "Time a task held a process, summed over attempts",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.1, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        )?;
        registry.register(Box::new(run_time.clone()))?;

        let signals = CounterVec::new(
            Opts::new("signals_sent_total", "Signals sent by the scheduler").namespace(NAMESPACE),
            &["signal"],
        )?;
        registry.register(Box::new(signals.clone()))?;

        let errors = CounterVec::new(
            Opts::new("task_errors_total", "Per-task errors").namespace(NAMESPACE),
            &["kind"],
        )?;
        registry.register(Box::new(errors.clone()))?;

        let load = Gauge::with_opts(
            Opts::new("load", "Latest load sample used for admission").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(load.clone()))?;

        Ok(Self {
            tasks_started,
            tasks_finished,
            run_time,
            signals,
            errors,
            load,
            registry,
        })
    }

    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every registered metric in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_task_started(&self) {
        self.tasks_started.inc();
    }

    fn record_task_finished(&self, outcome: TaskOutcome, duration_ms: u64) {
        self.tasks_finished
            .with_label_values(&[outcome.as_label()])
            .inc();
        self.run_time.observe(duration_ms as f64 / 1000.0);
    }

    fn record_signal(&self, signal: SignalKind) {
        self.signals.with_label_values(&[signal.as_label()]).inc();
    }

    fn record_task_error(&self, error_kind: &str) {
        self.errors.with_label_values(&[error_kind]).inc();
    }

    fn record_load_sample(&self, load: f64) {
        self.load.set(load);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("{name} not found"))
    }

    #[test]
    fn finished_tasks_are_counted_by_outcome() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_task_finished(TaskOutcome::Completed, 150);
        metrics.record_task_finished(TaskOutcome::Completed, 50);
        metrics.record_task_finished(TaskOutcome::Killed, 9000);

        let families = metrics.gather();
        assert_eq!(
            family(&families, "cirno_tasks_finished_total")
                .get_metric()
                .len(),
            2
        );
        let run_time = family(&families, "cirno_task_run_seconds");
        assert_eq!(run_time.get_metric()[0].get_histogram().get_sample_count(), 3);
    }

    #[test]
    fn signals_are_counted_by_kind() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_signal(SignalKind::Notify);
        metrics.record_signal(SignalKind::Kill);
        metrics.record_signal(SignalKind::Kill);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains(r#"cirno_signals_sent_total{signal="kill"} 2"#));
        assert!(text.contains(r#"cirno_signals_sent_total{signal="notify"} 1"#));
    }

    #[test]
    fn load_gauge_keeps_the_latest_sample() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_load_sample(0.5);
        metrics.record_load_sample(2.25);
        metrics.record_task_started();
        metrics.record_task_error("spawn");

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("cirno_load 2.25"));
        assert!(text.contains("cirno_tasks_started_total 1"));
        assert!(text.contains(r#"cirno_task_errors_total{kind="spawn"} 1"#));
    }

    #[test]
    fn metrics_land_in_a_shared_registry() {
        let registry = Arc::new(Registry::new());
        let metrics = PrometheusMetrics::new_with_registry(registry.clone()).unwrap();
        metrics.record_task_started();
        assert!(!registry.gather().is_empty());
        assert!(PrometheusMetrics::new_with_registry(registry).is_err());
    }
}
