use std::fmt;

use serde::{Deserialize, Serialize};

/// Signals the scheduler is allowed to send.
///
/// The mapping to concrete POSIX signals is fixed:
/// - `Notify` → `SIGALRM` (timeout detected);
/// - `Stop`   → `SIGTERM` (load shedding);
/// - `Kill`   → `SIGKILL` (ladder exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    Notify,
    Stop,
    Kill,
}

impl SignalKind {
    /// Conventional POSIX name of the signal.
    pub fn posix_name(&self) -> &'static str {
        match self {
            SignalKind::Notify => "SIGALRM",
            SignalKind::Stop => "SIGTERM",
            SignalKind::Kill => "SIGKILL",
        }
    }

    /// Lower-case label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalKind::Notify => "notify",
            SignalKind::Stop => "stop",
            SignalKind::Kill => "kill",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.posix_name())
    }
}
