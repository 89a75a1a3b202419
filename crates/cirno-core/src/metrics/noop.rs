use cirno_model::SignalKind;

use crate::metrics::backend::{MetricsBackend, TaskOutcome};

/// Metrics backend that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_task_started(&self) {}

    #[inline(always)]
    fn record_task_finished(&self, _: TaskOutcome, _: u64) {}

    #[inline(always)]
    fn record_signal(&self, _: SignalKind) {}

    #[inline(always)]
    fn record_task_error(&self, _: &str) {}

    #[inline(always)]
    fn record_load_sample(&self, _: f64) {}
}
