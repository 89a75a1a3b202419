mod config;
pub use config::ExecConfig;

mod error;
pub use error::ExecError;

mod load;
pub use load::{LoadAvgSource, LoadWindow};

mod pressure;
pub use pressure::{
    GpuCard, MemoryBands, PressureConfig, ResourceGate, has_free_card, per_task_estimate,
    query_nvidia,
};

mod process;
pub use process::ProcessTable;

mod utils;
pub use utils::descendants;
