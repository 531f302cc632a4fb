//! Periodic driver for the poller.
//!
//! The scheduler runs one cycle immediately on start, then one per
//! interval until cancelled. Cycles never overlap: each is awaited before
//! the next tick is taken, and ticks missed while a cycle was running
//! collapse into a single follow-up cycle.
//!
//! ```text
//! Idle -> Running -> Stopping -> Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::poller::Poller;

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Lower bound accepted for the interval (`tokio::time::interval`
/// rejects zero).
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

pub struct Scheduler {
    poller: Arc<Poller>,
    interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(poller: Arc<Poller>, interval: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            poller,
            interval: interval.max(MIN_POLL_INTERVAL),
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions (used by the HTTP status endpoint).
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Drive poll cycles until `cancel` fires. Returns the number of
    /// cycles started.
    ///
    /// A cycle in flight when `cancel` fires is allowed to unwind (its
    /// fetches observe the same token) before the scheduler reports
    /// [`SchedulerState::Stopped`].
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        self.transition(SchedulerState::Running);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.transition(SchedulerState::Stopping);
                    break;
                }
                _ = ticker.tick() => {}
            }

            cycles += 1;
            tracing::debug!(cycle = cycles, "Starting poll cycle");

            let cycle = self.poller.run_cycle(&cancel);
            tokio::pin!(cycle);

            tokio::select! {
                _ = &mut cycle => {}
                _ = cancel.cancelled() => {
                    self.transition(SchedulerState::Stopping);
                    cycle.await;
                    break;
                }
            }
        }

        self.transition(SchedulerState::Stopped);
        cycles
    }

    fn transition(&self, next: SchedulerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(from = ?previous, to = ?next, "Scheduler state changed");
        }
    }
}
