//! Periodic tasks driven by the scheduler

/// Elapsed-time accumulator of one task slot.
///
/// Period and base period share the same unit (microseconds). A period that is
/// `k` times the base period fires on every `k`-th pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskTimer {
    period: u32,
    elapsed: u32,
}

impl TaskTimer {
    /// Period 0 fires on every pass.
    pub const fn new(period: u32) -> Self {
        Self { period, elapsed: 0 }
    }

    /// A period of `ticks` base periods
    pub const fn every(ticks: u32, base_period: u32) -> Self {
        Self::new(ticks.saturating_mul(base_period))
    }

    /// Adds one base period; true when the task is due, which also restarts
    /// the accumulator.
    pub fn update_and_check_time(&mut self, base_period: u32) -> bool {
        self.elapsed = self.elapsed.saturating_add(base_period);
        if self.elapsed >= self.period {
            self.elapsed = 0;
            true
        } else {
            false
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }
}

/// A unit of periodic work.
///
/// `tick` runs in the main loop and must return before the next base tick,
/// otherwise every task after it in the same pass is delayed.
pub trait Task {
    fn timer(&mut self) -> &mut TaskTimer;

    fn tick(&mut self);

    /// Called once per scheduler pass whether or not the task is due.
    fn update_and_check_time(&mut self, base_period: u32) -> bool {
        self.timer().update_and_check_time(base_period)
    }
}

/// Deadline check a task runs against the tick counter.
///
/// The scheduler never looks at lateness; a task that cares holds one of
/// these and asks it at the start of every `tick`.
#[derive(Clone, Copy, Debug)]
pub struct OverrunMonitor {
    period_ticks: u32,
    due: Option<u32>,
    overruns: u32,
    worst_lateness: u32,
}

impl OverrunMonitor {
    pub const fn new(period_ticks: u32) -> Self {
        Self {
            period_ticks,
            due: None,
            overruns: 0,
            worst_lateness: 0,
        }
    }

    /// Records an activation at tick `now`, returns how many ticks late it was.
    ///
    /// Every activation re-arms the next deadline from `now`, so after a late
    /// or early activation the deadline follows the pass schedule again.
    pub fn check(&mut self, now: u32) -> u32 {
        let lateness = match self.due {
            Some(due) => {
                let diff = now.wrapping_sub(due);
                // Values past half the range are early, not late
                if diff != 0 && diff < u32::MAX / 2 {
                    diff
                } else {
                    0
                }
            }
            None => 0,
        };

        if lateness > 0 {
            self.overruns = self.overruns.wrapping_add(1);
            self.worst_lateness = self.worst_lateness.max(lateness);
        }
        self.due = Some(now.wrapping_add(self.period_ticks));
        lateness
    }

    /// Whether work that began at tick `started` spilled past its period.
    pub fn overran(&self, started: u32, now: u32) -> bool {
        now.wrapping_sub(started) >= self.period_ticks.max(1)
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    pub fn worst_lateness(&self) -> u32 {
        self.worst_lateness
    }
}
