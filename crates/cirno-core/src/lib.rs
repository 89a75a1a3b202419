pub mod admission;
pub mod config;
pub mod control;
pub mod error;
pub mod escalation;
pub mod load;
pub mod metrics;
pub mod scheduler;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use admission::{AdmissionDecision, AdmissionInput, AdmissionPolicy, QueuedTask, RunningTask};
pub use config::SchedulerConfig;
pub use control::{Delivery, ExitOutcome, Pid, ProcessControl};
pub use error::{CoreError, TaskError};
pub use escalation::{EscalationController, Step, Sweep};
pub use load::{LoadSource, Pressure};
pub use metrics::{MetricsBackend, MetricsHandle, NoOpMetrics, TaskOutcome, noop_metrics};
pub use scheduler::{
    RunEnd, RunReport, RungChange, Scheduler, TaskRecord, TaskView, TickObserver, TickReport,
    Transition,
};
pub use task::{Episode, ProcessHandle, Task, TaskSet};

pub mod prelude {
    pub use crate::config::SchedulerConfig;
    pub use crate::control::{Delivery, ExitOutcome, Pid, ProcessControl};
    pub use crate::error::{CoreError, TaskError};
    pub use crate::load::{LoadSource, Pressure};
    pub use crate::scheduler::{RunReport, Scheduler};
}
