use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::control::ProcessControl;
use crate::load::LoadSource;
use crate::scheduler::{Scheduler, TaskView, TickReport};

/// Why [`Scheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Every task reached a terminal state.
    Drained,
    /// The cancellation token fired; live tasks were killed.
    Canceled,
}

/// Receives every tick report together with a snapshot of the live tasks.
pub trait TickObserver {
    fn on_tick(&mut self, report: &TickReport, tasks: &[TaskView]);
}

impl<F> TickObserver for F
where
    F: FnMut(&TickReport, &[TaskView]),
{
    fn on_tick(&mut self, report: &TickReport, tasks: &[TaskView]) {
        self(report, tasks)
    }
}

impl<P: ProcessControl> Scheduler<P> {
    /// Tick until every task is terminal or `cancel` fires.
    ///
    /// The first tick runs immediately. Ticks that fall behind are delayed, not bunched.
    pub async fn run<L, O>(
        &mut self,
        load: &mut L,
        cancel: &CancellationToken,
        observer: &mut O,
    ) -> RunEnd
    where
        L: LoadSource + ?Sized,
        O: TickObserver + ?Sized,
    {
        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tasks = self.tasks.len(),
            threshold = self.config.threshold,
            tick_ms = self.config.tick.as_millis() as u64,
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("run canceled, killing live tasks");
                    let now = Instant::now().into_std();
                    let report = self.shutdown(now);
                    observer.on_tick(&report, &self.snapshot(now));
                    return RunEnd::Canceled;
                }
                _ = ticker.tick() => {}
            }

            let now = Instant::now().into_std();
            let report = self.tick(now, load);
            observer.on_tick(&report, &self.snapshot(now));
            if self.is_drained() {
                info!(ticks = self.ticks, "all tasks finished");
                return RunEnd::Drained;
            }
        }
    }
}
