use std::path::PathBuf;

use crate::load::LoadWindow;

/// Settings for spawning children and sampling load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    /// Directory holding one `<label>.log` output file per task.
    pub run_dir: PathBuf,
    /// Append stderr to the output file too; otherwise it is inherited.
    pub capture_stderr: bool,
    /// Load-average window used for admission.
    pub load_window: LoadWindow,
    /// Divide the load average by the number of CPUs.
    pub per_cpu_load: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from("cirno-run"),
            capture_stderr: false,
            load_window: LoadWindow::default(),
            per_cpu_load: false,
        }
    }
}

impl ExecConfig {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            ..Self::default()
        }
    }

    /// Path of the output file for a task label.
    pub fn output_path(&self, label: &str) -> PathBuf {
        self.run_dir.join(format!("{label}.log"))
    }
}
