mod domain;
pub use domain::{TaskId, TimeoutMs, Weight};

mod error;
pub use error::{ModelError, ModelResult};

mod spec;
pub use spec::TaskSpec;

mod state;
pub use state::{EpisodeKind, Rung, SignalKind, TaskState};

pub mod tasklist;
pub use tasklist::{TaskListOptions, parse_duration, parse_task_list, read_task_list};
