//! Prometheus metrics backend for the cirno scheduler.
//!
//! [`PrometheusMetrics`] implements [`cirno_core::MetricsBackend`]. The scheduler is a
//! batch tool, so there is no scrape endpoint: render the registry with
//! [`PrometheusMetrics::encode_text`] at the end of a run and write it where a node
//! exporter's textfile collector (or a human) can read it.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use cirno_core::{MetricsBackend, TaskOutcome};
//! use cirno_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: Arc<dyn MetricsBackend> = Arc::new(metrics.clone());
//! handle.record_task_finished(TaskOutcome::Completed, 1200);
//!
//! let text = metrics.encode_text()?;
//! assert!(text.contains("cirno_tasks_finished_total"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `cirno_tasks_started_total` - Counter
//! - `cirno_tasks_finished_total{outcome}` - Counter
//! - `cirno_task_run_seconds` - Histogram
//! - `cirno_signals_sent_total{signal}` - Counter
//! - `cirno_task_errors_total{kind}` - Counter
//! - `cirno_load` - Gauge, latest load sample
mod backend;
pub use backend::PrometheusMetrics;
