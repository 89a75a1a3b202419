//! Metrics collection abstraction for the scheduler.
//!
//! Backends (prometheus, statsd, etc) implement [`MetricsBackend`] and are handed to
//! [`crate::Scheduler::with_metrics`]. Without one the scheduler uses [`NoOpMetrics`].
mod backend;
pub use backend::{MetricsBackend, MetricsHandle, TaskOutcome};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
