use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a task for the lifetime of one scheduler run.
///
/// Ids are assigned in submission order starting at 1, so comparing ids
/// compares arrival order. Admission and eviction rely on this for tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw sequence number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw sequence number.
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Next id in submission order.
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::TaskId;

    #[test]
    fn ordering_follows_submission_order() {
        let first = TaskId::new(1);
        let second = first.next();

        assert!(first < second);
        assert_eq!(second.get(), 2);
    }

    #[test]
    fn display_is_used_as_default_label() {
        assert_eq!(TaskId::new(7).to_string(), "task-7");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&TaskId::new(3)).unwrap();
        assert_eq!(json, "3");
    }
}
