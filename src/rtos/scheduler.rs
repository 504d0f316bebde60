//! Cooperative multi-rate scheduler
//!
//! One Timer1 tick drives every task. Each `schedule` call waits for the next
//! tick, then walks the task table in registration order, advancing every
//! slot and running the ones that are due, one after the other.
//!
//! The scheduler does not measure how long a pass takes. A task that runs
//! past the next tick delays all tasks behind it and the schedule falls
//! behind; collapsed ticks show up in [`TickSignal::overruns`] and each task
//! is responsible for noticing its own lateness (see `OverrunMonitor`).

use embedded_hal::timer::CountDown;
use void::Void;

use super::task::Task;
use super::tick::TickSignal;
use crate::config::TASK_CAPACITY;
use crate::hal::timer::{Microseconds, TickSource, TimerConfig, TimerRegisters};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// All task slots are taken
    TaskTableFull,
}

impl ufmt::uDisplay for Error {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        match self {
            Error::TaskTableFull => f.write_str("task table full"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// `init` done, no pass run yet
    Initialized,
    /// At least one pass run
    Running,
}

/// Counters kept across passes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub passes: u32,
    pub dispatched: u32,
    pub rejected: u16,
    pub tick_overruns: u32,
}

impl ufmt::uDisplay for Stats {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        ufmt::uwrite!(
            f,
            "passes={} dispatched={} rejected={} tick_overruns={}",
            self.passes,
            self.dispatched,
            self.rejected,
            self.tick_overruns
        )
    }
}

pub struct Scheduler<'a, R: TimerRegisters> {
    base_period: u32,
    timer: TickSource<'a, R>,
    tasks: [Option<&'a mut dyn Task>; TASK_CAPACITY],
    task_count: usize,
    stats: Stats,
}

impl<'a, R: TimerRegisters> Scheduler<'a, R> {
    /// Takes the tick source, programs it for `base_period_us` and starts it.
    ///
    /// The callback that signals ticks must already be attached, or be
    /// attached through [`Scheduler::tick_source_mut`] before the first
    /// `schedule`.
    pub fn init(mut timer: TickSource<'a, R>, base_period_us: u32) -> Self {
        CountDown::start(&mut timer, Microseconds(base_period_us));

        Self {
            base_period: base_period_us,
            timer,
            tasks: Default::default(),
            task_count: 0,
            stats: Stats::default(),
        }
    }

    /// Appends a task, returning its slot index.
    ///
    /// Registration order is firing order. A full table rejects the task and
    /// leaves the registered ones untouched.
    pub fn add_task(&mut self, task: &'a mut dyn Task) -> Result<usize, Error> {
        if self.task_count >= TASK_CAPACITY {
            self.stats.rejected = self.stats.rejected.saturating_add(1);
            return Err(Error::TaskTableFull);
        }

        let index = self.task_count;
        self.tasks[index] = Some(task);
        self.task_count += 1;
        Ok(index)
    }

    /// Waits for the next tick, then runs one pass.
    pub fn schedule(&mut self) {
        match nb::block!(self.try_schedule()) {
            Ok(()) => {}
            Err(never) => void::unreachable(never),
        }
    }

    /// Runs one pass if a tick is pending, `WouldBlock` otherwise.
    pub fn try_schedule(&mut self) -> nb::Result<(), Void> {
        self.timer.wait()?;
        self.run_pass();
        Ok(())
    }

    /// Never returns; the device runs until reset.
    pub fn run(&mut self) -> ! {
        loop {
            self.schedule();
        }
    }

    fn run_pass(&mut self) {
        let base_period = self.base_period;
        let mut dispatched = 0u32;

        for task in self.tasks[..self.task_count].iter_mut().flatten() {
            if task.update_and_check_time(base_period) {
                task.tick();
                dispatched += 1;
            }
        }

        self.stats.passes = self.stats.passes.wrapping_add(1);
        self.stats.dispatched = self.stats.dispatched.wrapping_add(dispatched);
    }

    pub fn state(&self) -> SchedulerState {
        if self.stats.passes == 0 {
            SchedulerState::Initialized
        } else {
            SchedulerState::Running
        }
    }

    pub fn base_period(&self) -> u32 {
        self.base_period
    }

    pub fn task_count(&self) -> usize {
        self.task_count
    }

    pub fn capacity(&self) -> usize {
        TASK_CAPACITY
    }

    pub fn timer_config(&self) -> TimerConfig {
        self.timer.config()
    }

    pub fn ticks(&self) -> &'a TickSignal {
        self.timer.ticks()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            tick_overruns: self.timer.ticks().overruns(),
            ..self.stats
        }
    }

    pub fn tick_source(&self) -> &TickSource<'a, R> {
        &self.timer
    }

    pub fn tick_source_mut(&mut self) -> &mut TickSource<'a, R> {
        &mut self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::timer::{InterruptHook, Prescaler, SoftTimer};
    use crate::rtos::task::TaskTimer;
    use std::cell::RefCell;
    use std::vec::Vec;

    struct Recorder<'l> {
        id: u8,
        timer: TaskTimer,
        log: &'l RefCell<Vec<(u32, u8)>>,
        pass: &'l core::cell::Cell<u32>,
    }

    impl Task for Recorder<'_> {
        fn timer(&mut self) -> &mut TaskTimer {
            &mut self.timer
        }

        fn tick(&mut self) {
            self.log.borrow_mut().push((self.pass.get(), self.id));
        }
    }

    struct Idle(TaskTimer);

    impl Task for Idle {
        fn timer(&mut self) -> &mut TaskTimer {
            &mut self.0
        }

        fn tick(&mut self) {}
    }

    #[test]
    fn init_starts_timer_at_base_period() {
        let hook = InterruptHook::new();
        let ticks = TickSignal::new();
        let source = TickSource::new(SoftTimer::new(), &hook, &ticks);

        let scheduler = Scheduler::init(source, 1000);
        assert_eq!(scheduler.base_period(), 1000);
        assert_eq!(scheduler.task_count(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Initialized);
        assert_eq!(scheduler.timer_config().prescaler, Prescaler::Direct);
        assert_eq!(scheduler.tick_source().registers().ocr1a, 16_000);
        assert!(scheduler.tick_source().is_running());
    }

    #[test]
    fn try_schedule_would_block_without_tick() {
        let hook = InterruptHook::new();
        let ticks = TickSignal::new();
        let source = TickSource::new(SoftTimer::new(), &hook, &ticks);
        let mut scheduler = Scheduler::init(source, 1000);

        assert!(matches!(
            scheduler.try_schedule(),
            Err(nb::Error::WouldBlock)
        ));
        assert_eq!(scheduler.stats().passes, 0);

        ticks.signal();
        assert!(scheduler.try_schedule().is_ok());
        assert_eq!(scheduler.state(), SchedulerState::Running);
    }

    #[test]
    fn tasks_fire_at_their_rate_in_registration_order() {
        let hook = InterruptHook::new();
        let ticks = TickSignal::new();
        let log = RefCell::new(Vec::new());
        let pass = core::cell::Cell::new(0);
        let mut a = Recorder {
            id: b'A',
            timer: TaskTimer::every(1, 1000),
            log: &log,
            pass: &pass,
        };
        let mut b = Recorder {
            id: b'B',
            timer: TaskTimer::every(3, 1000),
            log: &log,
            pass: &pass,
        };

        let source = TickSource::new(SoftTimer::new(), &hook, &ticks);
        let mut scheduler = Scheduler::init(source, 1000);
        assert_eq!(scheduler.add_task(&mut a), Ok(0));
        assert_eq!(scheduler.add_task(&mut b), Ok(1));

        for n in 1..=9 {
            pass.set(n);
            ticks.signal();
            scheduler.schedule();
        }

        let log = log.borrow();
        let a_passes: Vec<u32> = log.iter().filter(|e| e.1 == b'A').map(|e| e.0).collect();
        let b_passes: Vec<u32> = log.iter().filter(|e| e.1 == b'B').map(|e| e.0).collect();
        assert_eq!(a_passes, (1..=9).collect::<Vec<_>>());
        assert_eq!(b_passes, [3, 6, 9]);

        for n in [3, 6, 9] {
            let at: Vec<u8> = log.iter().filter(|e| e.0 == n).map(|e| e.1).collect();
            assert_eq!(at, [b'A', b'B']);
        }

        let stats = scheduler.stats();
        assert_eq!(stats.passes, 9);
        assert_eq!(stats.dispatched, 12);
    }

    #[test]
    fn full_table_rejects_without_touching_order() {
        let hook = InterruptHook::new();
        let ticks = TickSignal::new();
        let source = TickSource::new(SoftTimer::new(), &hook, &ticks);
        let log = RefCell::new(Vec::new());
        let pass = core::cell::Cell::new(1);

        let mut tasks: Vec<Recorder> = (0..TASK_CAPACITY as u8)
            .map(|id| Recorder {
                id,
                timer: TaskTimer::every(1, 1000),
                log: &log,
                pass: &pass,
            })
            .collect();
        let mut extra = Idle(TaskTimer::new(1000));

        let mut scheduler = Scheduler::init(source, 1000);
        for (i, task) in tasks.iter_mut().enumerate() {
            assert_eq!(scheduler.add_task(task), Ok(i));
        }
        assert_eq!(scheduler.add_task(&mut extra), Err(Error::TaskTableFull));
        assert_eq!(scheduler.task_count(), TASK_CAPACITY);
        assert_eq!(scheduler.stats().rejected, 1);

        ticks.signal();
        scheduler.schedule();
        let order: Vec<u8> = log.borrow().iter().map(|e| e.1).collect();
        assert_eq!(order, (0..TASK_CAPACITY as u8).collect::<Vec<_>>());
    }

    #[test]
    fn collapsed_ticks_run_a_single_pass() {
        let hook = InterruptHook::new();
        let ticks = TickSignal::new();
        let source = TickSource::new(SoftTimer::new(), &hook, &ticks);
        let mut idle = Idle(TaskTimer::every(2, 1000));
        let mut scheduler = Scheduler::init(source, 1000);
        scheduler.add_task(&mut idle).unwrap();

        ticks.signal();
        ticks.signal();
        ticks.signal();
        scheduler.schedule();
        assert!(matches!(
            scheduler.try_schedule(),
            Err(nb::Error::WouldBlock)
        ));

        let stats = scheduler.stats();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.tick_overruns, 2);
    }

    #[test]
    fn stats_render_with_ufmt() {
        struct Line(std::string::String);

        impl ufmt::uWrite for Line {
            type Error = core::convert::Infallible;

            fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
                self.0.push_str(s);
                Ok(())
            }
        }

        let stats = Stats {
            passes: 10,
            dispatched: 4,
            rejected: 1,
            tick_overruns: 0,
        };
        let mut line = Line(std::string::String::new());
        ufmt::uwrite!(line, "{} / {}", stats, Error::TaskTableFull).unwrap();
        assert_eq!(
            line.0,
            "passes=10 dispatched=4 rejected=1 tick_overruns=0 / task table full"
        );
    }
}
