mod episode;
pub use episode::{EpisodeKind, Rung};

mod signal;
pub use signal::SignalKind;

mod task;
pub use task::TaskState;
