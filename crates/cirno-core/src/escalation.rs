//! Signal-escalation ladder for tasks in a stop episode.
//!
//! ```text
//! Notified | Terminating ──grace──► KillingDescendants ──grace──► KillingAll ──grace──► re-issue ...
//! ```
//!
//! The controller decides and delivers signals but never mutates task state: the loop
//! applies the returned [`Step`].
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use cirno_model::{EpisodeKind, Rung, SignalKind};

use crate::config::SchedulerConfig;
use crate::control::{Delivery, ExitOutcome, Pid, ProcessControl};
use crate::error::TaskError;
use crate::task::Episode;

/// What one SIGKILL sweep reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Descendants found by the fresh scan, parents before children.
    pub descendants: Vec<Pid>,
    /// Signals that reached a live process or group.
    pub signaled: usize,
    /// Descendants that could not be signaled. These never hold the rung.
    pub failures: Vec<TaskError>,
}

/// Outcome of one ladder check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Grace not elapsed yet, or nothing to do.
    Wait,
    /// Moved up one rung.
    Advanced { rung: Rung, sweep: Sweep },
    /// Still at the top rung; SIGKILL was sent again.
    Reissued(Sweep),
    /// The direct child is gone and has been reaped.
    Exited(ExitOutcome),
    /// Reaping, or SIGKILL to the child or its group, failed. The same rung is tried
    /// again on the next tick.
    Retry { error: TaskError, sweep: Sweep },
    /// The child survived every SIGKILL re-issue.
    GaveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationController {
    notify_grace: Duration,
    stop_grace: Duration,
    kill_retries: u32,
}

impl EscalationController {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            notify_grace: config.notify_grace,
            stop_grace: config.stop_grace,
            kill_retries: config.kill_retries,
        }
    }

    /// Signal that opens an episode of the given kind.
    pub fn entry_signal(kind: EpisodeKind) -> SignalKind {
        match kind {
            EpisodeKind::TimingOut => SignalKind::Notify,
            EpisodeKind::Yielding => SignalKind::Stop,
        }
    }

    fn grace(&self, kind: EpisodeKind) -> Duration {
        match kind {
            EpisodeKind::TimingOut => self.notify_grace,
            EpisodeKind::Yielding => self.stop_grace,
        }
    }

    /// Deliver the entry signal of a new episode to the direct child.
    pub fn begin(
        &self,
        kind: EpisodeKind,
        pid: Pid,
        control: &mut dyn ProcessControl,
    ) -> Result<Delivery, TaskError> {
        control.signal(pid, Self::entry_signal(kind))
    }

    /// Check one episode and climb the ladder if its grace has run out.
    pub fn advance(
        &self,
        episode: &Episode,
        pid: Pid,
        now: Instant,
        control: &mut dyn ProcessControl,
    ) -> Step {
        if episode.waited(now) < self.grace(episode.kind) {
            return Step::Wait;
        }
        match control.try_reap(pid) {
            Ok(Some(exit)) => return Step::Exited(exit),
            Ok(None) => {}
            Err(error) => {
                return Step::Retry {
                    error,
                    sweep: Sweep::default(),
                };
            }
        }

        match episode.rung {
            Rung::Notified | Rung::Terminating => {
                let descendants = discover(pid, control);
                Step::Advanced {
                    rung: Rung::KillingDescendants,
                    sweep: kill_descendants(descendants, control),
                }
            }
            Rung::KillingDescendants => {
                let descendants = discover(pid, control);
                match kill_all(pid, descendants, control) {
                    (sweep, None) => Step::Advanced {
                        rung: Rung::KillingAll,
                        sweep,
                    },
                    (sweep, Some(error)) => Step::Retry { error, sweep },
                }
            }
            Rung::KillingAll if episode.kill_attempts >= self.kill_retries => Step::GaveUp,
            Rung::KillingAll => {
                let descendants = discover(pid, control);
                match kill_all(pid, descendants, control) {
                    (sweep, None) => Step::Reissued(sweep),
                    (sweep, Some(error)) => Step::Retry { error, sweep },
                }
            }
            Rung::None => Step::Wait,
        }
    }
}

/// Fresh descendant scan. A failed scan leaves only the child and its group to signal.
fn discover(pid: Pid, control: &mut dyn ProcessControl) -> Vec<Pid> {
    match control.descendants(pid) {
        Ok(found) => found,
        Err(err) => {
            debug!(pid, error = %err, "descendant discovery failed");
            Vec::new()
        }
    }
}

/// SIGKILL descendants leaves first. Every pid is tried; failures are collected.
fn kill_descendants(descendants: Vec<Pid>, control: &mut dyn ProcessControl) -> Sweep {
    let mut sweep = Sweep {
        descendants,
        ..Sweep::default()
    };
    for pid in sweep.descendants.iter().rev() {
        match control.signal(*pid, SignalKind::Kill) {
            Ok(Delivery::Delivered) => {
                trace!(pid, "descendant killed");
                sweep.signaled += 1;
            }
            Ok(Delivery::AlreadyGone) => trace!(pid, "descendant already gone"),
            Err(err) => {
                debug!(pid, error = %err, "descendant kill failed");
                sweep.failures.push(err);
            }
        }
    }
    sweep
}

/// Sweep the descendants, then SIGKILL the group and the child.
///
/// Only a group or child failure is returned as the error; it holds the rung.
fn kill_all(
    pid: Pid,
    descendants: Vec<Pid>,
    control: &mut dyn ProcessControl,
) -> (Sweep, Option<TaskError>) {
    let mut sweep = kill_descendants(descendants, control);
    let group = control.signal_group(pid, SignalKind::Kill);
    let child = control.signal(pid, SignalKind::Kill);

    let mut held = None;
    for result in [group, child] {
        match result {
            Ok(Delivery::Delivered) => sweep.signaled += 1,
            Ok(Delivery::AlreadyGone) => {}
            Err(err) => {
                held.get_or_insert(err);
            }
        }
    }
    (sweep, held)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, FakeControl};
    use cirno_model::{TaskId, TaskSpec};

    const GRACE: Duration = Duration::from_secs(2);

    fn controller(kill_retries: u32) -> EscalationController {
        EscalationController {
            notify_grace: GRACE,
            stop_grace: GRACE,
            kill_retries,
        }
    }

    fn spawn(control: &mut FakeControl, command: &str) -> Pid {
        control
            .spawn(TaskId::new(1), "t", &TaskSpec::new(command))
            .unwrap()
    }

    fn episode(rung: Rung, at: Instant) -> Episode {
        Episode {
            kind: EpisodeKind::TimingOut,
            rung,
            entered_at: at,
            kill_attempts: 0,
        }
    }

    #[test]
    fn waits_for_grace() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        let t0 = Instant::now();
        let step = controller(3).advance(
            &episode(Rung::Notified, t0),
            pid,
            t0 + GRACE - Duration::from_millis(1),
            &mut control,
        );
        assert_eq!(step, Step::Wait);
        assert!(control.sent.is_empty());
    }

    #[test]
    fn first_kill_rung_spares_the_child() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        let child = control.fork(pid);
        let grandchild = control.fork(child);
        let t0 = Instant::now();

        let step = controller(3).advance(&episode(Rung::Notified, t0), pid, t0 + GRACE, &mut control);
        assert_eq!(
            step,
            Step::Advanced {
                rung: Rung::KillingDescendants,
                sweep: Sweep {
                    descendants: vec![child, grandchild],
                    signaled: 2,
                    failures: vec![],
                },
            }
        );
        // Leaves first.
        assert_eq!(
            control.sent.iter().map(|s| s.pid).collect::<Vec<_>>(),
            vec![grandchild, child]
        );
        assert!(control.is_alive(pid));
        assert!(control.signals_to(pid).is_empty());
    }

    #[test]
    fn second_kill_rung_hits_group_and_child() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        let t0 = Instant::now();

        let step = controller(3).advance(
            &episode(Rung::KillingDescendants, t0),
            pid,
            t0 + GRACE,
            &mut control,
        );
        // Group and child.
        assert_eq!(
            step,
            Step::Advanced {
                rung: Rung::KillingAll,
                sweep: Sweep {
                    signaled: 2,
                    ..Sweep::default()
                },
            }
        );
        assert!(control.sent.iter().any(|s| s.pid == pid && s.group));
        assert!(control.sent.iter().any(|s| s.pid == pid && !s.group));
        assert!(!control.is_alive(pid));
    }

    #[test]
    fn reports_exit_instead_of_signaling() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        control.exit(pid, 0);
        let t0 = Instant::now();

        let step = controller(3).advance(&episode(Rung::Notified, t0), pid, t0 + GRACE, &mut control);
        assert_eq!(step, Step::Exited(ExitOutcome::exited(0)));
        assert!(control.sent.is_empty());
    }

    #[test]
    fn child_delivery_failure_holds_the_rung() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        control.failing_signals.insert(pid);
        let t0 = Instant::now();

        let step = controller(3).advance(
            &episode(Rung::KillingDescendants, t0),
            pid,
            t0 + GRACE,
            &mut control,
        );
        assert!(matches!(
            step,
            Step::Retry {
                error: TaskError::Signal { .. },
                ..
            }
        ));
    }

    #[test]
    fn descendant_delivery_failure_still_advances() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        let stuck = control.fork(pid);
        let other = control.fork(pid);
        control.failing_signals.insert(stuck);
        let t0 = Instant::now();
        let ctl = controller(3);

        let Step::Advanced { rung, sweep } =
            ctl.advance(&episode(Rung::Notified, t0), pid, t0 + GRACE, &mut control)
        else {
            panic!("first kill rung must advance");
        };
        assert_eq!(rung, Rung::KillingDescendants);
        assert_eq!(sweep.descendants, vec![stuck, other]);
        assert_eq!(sweep.signaled, 1);
        assert!(matches!(
            sweep.failures.as_slice(),
            [TaskError::Signal { pid, .. }] if *pid == stuck
        ));
        assert!(control.is_alive(stuck));
        assert!(!control.is_alive(other));

        let Step::Advanced { rung, sweep } = ctl.advance(
            &episode(Rung::KillingDescendants, t0),
            pid,
            t0 + GRACE,
            &mut control,
        ) else {
            panic!("second kill rung must advance");
        };
        assert_eq!(rung, Rung::KillingAll);
        assert_eq!(sweep.failures.len(), 1);
        // Group and child.
        assert_eq!(sweep.signaled, 2);
        assert!(!control.is_alive(pid));
    }

    #[test]
    fn discovery_failure_still_advances() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        control.fork(pid);
        control.failing_discovery = true;
        let t0 = Instant::now();

        let step = controller(3).advance(&episode(Rung::Terminating, t0), pid, t0 + GRACE, &mut control);
        assert_eq!(
            step,
            Step::Advanced {
                rung: Rung::KillingDescendants,
                sweep: Sweep::default(),
            }
        );
    }

    #[test]
    fn top_rung_reissues_until_budget_is_spent() {
        let mut control = FakeControl::default().with_behavior("stuck", Behavior::Unkillable);
        let pid = spawn(&mut control, "stuck");
        let t0 = Instant::now();
        let ctl = controller(2);

        let mut ep = episode(Rung::KillingAll, t0);
        for attempt in 0..2 {
            ep.kill_attempts = attempt;
            let step = ctl.advance(&ep, pid, t0 + GRACE, &mut control);
            assert_eq!(
                step,
                Step::Reissued(Sweep {
                    signaled: 2,
                    ..Sweep::default()
                })
            );
        }
        ep.kill_attempts = 2;
        assert_eq!(ctl.advance(&ep, pid, t0 + GRACE, &mut control), Step::GaveUp);
    }

    #[test]
    fn stale_descendants_are_already_gone() {
        let mut control = FakeControl::default();
        let pid = spawn(&mut control, "sleep");
        let (sweep, held) = kill_all(pid, vec![999, 998], &mut control);
        assert_eq!(held, None);
        assert!(sweep.failures.is_empty());
        assert_eq!(sweep.signaled, 2);
        assert!(!control.is_alive(pid));
    }

    #[test]
    fn entry_signals_match_episode_kind() {
        assert_eq!(
            EscalationController::entry_signal(EpisodeKind::TimingOut),
            SignalKind::Notify
        );
        assert_eq!(
            EscalationController::entry_signal(EpisodeKind::Yielding),
            SignalKind::Stop
        );
    }
}
