mod id;
pub use id::TaskId;

/// Timeout value in milliseconds.
///
/// Used in task specifications where a per-task override of the run-wide default is allowed.
pub type TimeoutMs = u64;

/// Admission weight: the share of the load budget a task is assumed to consume once spawned.
///
/// Expressed in the same unit as the load sample (runnable processes, as in `loadavg`).
pub type Weight = f64;
