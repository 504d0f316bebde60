//! Demo tasks run by the firmware

use embedded_hal::digital::v2::OutputPin;

use crate::rtos::{OverrunMonitor, Task, TaskTimer, TickSignal};

/// Toggles an LED every period and keeps track of its own lateness.
pub struct Blink<'a, P: OutputPin> {
    led: P,
    lit: bool,
    timer: TaskTimer,
    monitor: OverrunMonitor,
    ticks: &'a TickSignal,
    toggles: u32,
    faults: u16,
}

impl<'a, P: OutputPin> Blink<'a, P> {
    /// `period_us` should be a multiple of `base_period_us`.
    pub fn new(led: P, period_us: u32, base_period_us: u32, ticks: &'a TickSignal) -> Self {
        let period_ticks = period_us / base_period_us.max(1);
        Self {
            led,
            lit: false,
            timer: TaskTimer::new(period_us),
            monitor: OverrunMonitor::new(period_ticks),
            ticks,
            toggles: 0,
            faults: 0,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    /// Pin writes that returned an error
    pub fn faults(&self) -> u16 {
        self.faults
    }

    /// Activations that came later than their deadline
    pub fn overruns(&self) -> u32 {
        self.monitor.overruns()
    }

    pub fn release(self) -> P {
        self.led
    }
}

impl<P: OutputPin> Task for Blink<'_, P> {
    fn timer(&mut self) -> &mut TaskTimer {
        &mut self.timer
    }

    fn tick(&mut self) {
        self.monitor.check(self.ticks.now());

        let result = if self.lit {
            self.led.set_low()
        } else {
            self.led.set_high()
        };
        match result {
            Ok(()) => {
                self.lit = !self.lit;
                self.toggles = self.toggles.wrapping_add(1);
            }
            Err(_) => self.faults = self.faults.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

    #[test]
    fn toggles_on_every_activation() {
        let ticks = TickSignal::new();
        let expectations = [
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ];
        let mut blink = Blink::new(PinMock::new(&expectations), 2000, 1000, &ticks);

        for _ in 0..3 {
            ticks.signal();
            ticks.signal();
            ticks.take();
            blink.tick();
        }
        assert!(blink.is_lit());
        assert_eq!(blink.toggles(), 3);
        assert_eq!(blink.faults(), 0);
        assert_eq!(blink.overruns(), 0);
        blink.release().done();
    }

    #[test]
    fn fires_on_its_period_only() {
        let ticks = TickSignal::new();
        let expectations = [PinTransaction::set(PinState::High)];
        let mut blink = Blink::new(PinMock::new(&expectations), 3000, 1000, &ticks);

        let due: Vec<bool> = (0..3)
            .map(|_| blink.update_and_check_time(1000))
            .collect();
        assert_eq!(due, [false, false, true]);
        blink.tick();
        blink.release().done();
    }

    #[test]
    fn late_activation_counts_as_overrun() {
        let ticks = TickSignal::new();
        let expectations = [
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ];
        let mut blink = Blink::new(PinMock::new(&expectations), 2000, 1000, &ticks);

        ticks.signal();
        ticks.signal();
        blink.tick();
        // Three ticks go by instead of two
        ticks.signal();
        ticks.signal();
        ticks.signal();
        blink.tick();
        assert_eq!(blink.overruns(), 1);
        blink.release().done();
    }
}
