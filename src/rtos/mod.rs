//! Tick-driven cooperative scheduling

pub mod scheduler;
pub mod task;
pub mod tick;

pub use scheduler::{Error, Scheduler, SchedulerState, Stats};
pub use task::{OverrunMonitor, Task, TaskTimer};
pub use tick::TickSignal;
