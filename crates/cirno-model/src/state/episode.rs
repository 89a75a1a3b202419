use std::fmt;

use serde::{Deserialize, Serialize};

/// What started a stop episode.
///
/// Both kinds walk the same ladder; they differ in the entry signal and in what
/// happens when the child exits before it is force-killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EpisodeKind {
    /// The task ran past its timeout.
    TimingOut,
    /// The task was picked to relieve system load.
    Yielding,
}

impl EpisodeKind {
    /// Rung entered together with the episode.
    pub fn entry_rung(&self) -> Rung {
        match self {
            EpisodeKind::TimingOut => Rung::Notified,
            EpisodeKind::Yielding => Rung::Terminating,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeKind::TimingOut => "timing-out",
            EpisodeKind::Yielding => "yielding",
        }
    }
}

impl fmt::Display for EpisodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of the signal-escalation ladder.
///
/// Variants are declared in ladder order, so `PartialOrd` compares harshness.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Rung {
    /// No stop episode in progress.
    #[default]
    None,
    /// Notify signal delivered after a timeout.
    Notified,
    /// Stop signal delivered to shed load.
    Terminating,
    /// Forceful kill delivered to the descendants of the child.
    KillingDescendants,
    /// Forceful kill delivered to the child, its process group and its descendants.
    KillingAll,
}

impl Rung {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rung::None => "none",
            Rung::Notified => "notified",
            Rung::Terminating => "terminating",
            Rung::KillingDescendants => "killing-descendants",
            Rung::KillingAll => "killing-all",
        }
    }
}

impl fmt::Display for Rung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
