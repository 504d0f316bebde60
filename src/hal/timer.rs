//! Timer1 tick source
//!
//! Timer1 runs in CTC mode: the counter climbs to OCR1A, raises the compare
//! match interrupt and restarts from zero. [`TickSource`] turns a period in
//! microseconds into a prescaler and compare value and owns the interrupt
//! hook that the `TIMER1_COMPA` vector dispatches through.

use core::cell::Cell;

use critical_section::Mutex;
use embedded_hal::timer::{CountDown, Periodic};
use void::Void;

use crate::config::{CYCLES_PER_MICROSECOND, TIMER1_COUNTER_MAX};
use crate::rtos::tick::TickSignal;

/// TCCR1B waveform bit selecting CTC mode with OCR1A as top
pub const WGM12: u8 = 1 << 3;

/// Clock select bits CS12..CS10 in TCCR1B
pub const CS_MASK: u8 = 0x07;

/// Register access for one 16-bit timer channel.
///
/// The compare and counter registers are two bytes wide; writes go through a
/// shared TEMP latch on AVR, so callers wrap them in a critical section.
pub trait TimerRegisters {
    fn write_control_a(&mut self, bits: u8);
    fn control_b(&self) -> u8;
    fn write_control_b(&mut self, bits: u8);
    fn compare(&self) -> u16;
    fn write_compare(&mut self, value: u16);
    fn counter(&self) -> u16;
    fn write_counter(&mut self, value: u16);
    fn compare_interrupt_enabled(&self) -> bool;
    fn set_compare_interrupt(&mut self, enabled: bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prescaler {
    Stop = 0,
    Direct = 1,
    Div8 = 2,
    Div64 = 3,
    Div256 = 4,
    Div1024 = 5,
}

impl Prescaler {
    /// Candidates in ascending order; the first one that fits wins.
    pub const ALL: [Prescaler; 5] = [
        Prescaler::Direct,
        Prescaler::Div8,
        Prescaler::Div64,
        Prescaler::Div256,
        Prescaler::Div1024,
    ];

    /// Clock divisor, 0 when the clock source is stopped
    pub const fn factor(self) -> u32 {
        match self {
            Prescaler::Stop => 0,
            Prescaler::Direct => 1,
            Prescaler::Div8 => 8,
            Prescaler::Div64 => 64,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }

    /// CS12..CS10 value for TCCR1B
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Prescaler and compare value for one requested period
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerConfig {
    pub prescaler: Prescaler,
    pub compare: u16,
    clamped: bool,
}

impl TimerConfig {
    /// Timer clock stopped, compare register cleared
    pub const fn stopped() -> Self {
        Self {
            prescaler: Prescaler::Stop,
            compare: 0,
            clamped: false,
        }
    }

    /// Configuration for `period_us` at the board clock.
    pub fn for_period(period_us: u32) -> Self {
        Self::with_clock(period_us, CYCLES_PER_MICROSECOND)
    }

    /// Picks the smallest prescaler with `cycles < counter range × prescaler`.
    ///
    /// Periods that do not fit even at /1024 clamp to the largest compare value
    /// instead of failing.
    pub fn with_clock(period_us: u32, cycles_per_us: u32) -> Self {
        let cycles = period_us.saturating_mul(cycles_per_us);

        for prescaler in Prescaler::ALL {
            let factor = prescaler.factor();
            if cycles < TIMER1_COUNTER_MAX * factor {
                return Self {
                    prescaler,
                    compare: (cycles / factor) as u16,
                    clamped: false,
                };
            }
        }

        Self {
            prescaler: Prescaler::Div1024,
            compare: (TIMER1_COUNTER_MAX - 1) as u16,
            clamped: true,
        }
    }

    /// True when the requested period was too long and got clamped
    pub fn is_clamped(&self) -> bool {
        self.clamped
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::stopped()
    }
}

/// Interrupt-time action of the timer
#[derive(Clone, Copy, Debug, Default)]
pub enum Callback {
    #[default]
    Noop,
    Handler(fn()),
}

impl Callback {
    #[inline]
    pub fn invoke(self) {
        if let Callback::Handler(f) = self {
            f();
        }
    }

    /// Whether `f` is the installed handler
    pub fn is(self, f: fn()) -> bool {
        match self {
            Callback::Handler(g) => g as usize == f as usize,
            Callback::Noop => false,
        }
    }

    pub fn is_noop(self) -> bool {
        matches!(self, Callback::Noop)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Callback::Noop, Callback::Noop) => true,
            (Callback::Handler(a), Callback::Handler(b)) => a as usize == b as usize,
            _ => false,
        }
    }
}

impl Eq for Callback {}

/// Callback slot read by the compare-match vector.
///
/// A function pointer is two bytes on AVR, so swaps and reads both happen in
/// a critical section.
pub struct InterruptHook {
    callback: Mutex<Cell<Callback>>,
}

impl InterruptHook {
    pub const fn new() -> Self {
        Self {
            callback: Mutex::new(Cell::new(Callback::Noop)),
        }
    }

    pub fn current(&self) -> Callback {
        critical_section::with(|cs| self.callback.borrow(cs).get())
    }

    /// Runs the installed callback. Called from interrupt context only.
    #[inline]
    pub fn dispatch(&self) {
        self.current().invoke();
    }

    fn install(&self, callback: Callback) {
        critical_section::with(|cs| self.callback.borrow(cs).set(callback));
    }
}

impl Default for InterruptHook {
    fn default() -> Self {
        Self::new()
    }
}

/// Period of a [`TickSource`] countdown
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Microseconds(pub u32);

impl From<u32> for Microseconds {
    fn from(us: u32) -> Self {
        Microseconds(us)
    }
}

/// The single hardware tick channel.
///
/// Never cloned: on target it owns the PAC `TC1` token.
pub struct TickSource<'a, R: TimerRegisters> {
    regs: R,
    hook: &'a InterruptHook,
    ticks: &'a TickSignal,
    config: TimerConfig,
}

impl<'a, R: TimerRegisters> TickSource<'a, R> {
    /// Puts the timer in CTC mode with its clock stopped, compare interrupt
    /// off and counter cleared.
    pub fn new(mut regs: R, hook: &'a InterruptHook, ticks: &'a TickSignal) -> Self {
        regs.write_control_b(WGM12);
        regs.write_control_a(0);
        regs.set_compare_interrupt(false);
        critical_section::with(|_| regs.write_counter(0));

        Self {
            regs,
            hook,
            ticks,
            config: TimerConfig::stopped(),
        }
    }

    /// Computes and loads the compare value for `period_us`.
    ///
    /// The clock select bits are only latched here; `start` applies them.
    pub fn configure(&mut self, period_us: u32) -> TimerConfig {
        let config = TimerConfig::for_period(period_us);
        self.config = config;
        critical_section::with(|_| self.regs.write_compare(config.compare));
        config
    }

    pub fn attach_callback(&mut self, f: fn()) {
        self.hook.install(Callback::Handler(f));
        self.regs.set_compare_interrupt(true);
    }

    pub fn detach_callback(&mut self) {
        self.regs.set_compare_interrupt(false);
        self.hook.install(Callback::Noop);
    }

    pub fn callback(&self) -> Callback {
        self.hook.current()
    }

    /// Applies the latched clock select bits, the counter starts running.
    pub fn start(&mut self) {
        let control = self.regs.control_b() & !CS_MASK;
        self.regs
            .write_control_b(control | WGM12 | self.config.prescaler.bits());
    }

    /// Removes the clock source. The counter keeps its value.
    pub fn stop(&mut self) {
        let control = self.regs.control_b() & !CS_MASK;
        self.regs.write_control_b(control | WGM12);
    }

    pub fn reset(&mut self) {
        critical_section::with(|_| self.regs.write_counter(0));
    }

    pub fn is_running(&self) -> bool {
        self.regs.control_b() & CS_MASK != 0
    }

    pub fn config(&self) -> TimerConfig {
        self.config
    }

    pub fn ticks(&self) -> &'a TickSignal {
        self.ticks
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Stops the timer and gives the register block back.
    pub fn free(mut self) -> R {
        self.detach_callback();
        self.stop();
        self.regs
    }
}

impl<R: TimerRegisters> CountDown for TickSource<'_, R> {
    type Time = Microseconds;

    fn start<T>(&mut self, count: T)
    where
        T: Into<Microseconds>,
    {
        let Microseconds(period_us) = count.into();
        Self::stop(self);
        self.configure(period_us);
        self.reset();
        self.ticks.clear();
        Self::start(self);
    }

    fn wait(&mut self) -> nb::Result<(), Void> {
        if self.ticks.take() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl<R: TimerRegisters> Periodic for TickSource<'_, R> {}

/// Software model of Timer1 for host builds.
///
/// `clock` feeds timer clock cycles (before prescaling) and reports how many
/// compare matches the CTC counter produced while running.
#[derive(Clone, Debug, Default)]
pub struct SoftTimer {
    pub tccr1a: u8,
    pub tccr1b: u8,
    pub tcnt1: u16,
    pub ocr1a: u16,
    pub ocie1a: bool,
    residue: u32,
}

impl SoftTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prescaler(&self) -> Prescaler {
        match self.tccr1b & CS_MASK {
            1 => Prescaler::Direct,
            2 => Prescaler::Div8,
            3 => Prescaler::Div64,
            4 => Prescaler::Div256,
            5 => Prescaler::Div1024,
            _ => Prescaler::Stop,
        }
    }

    /// Advances by `cycles` CPU clocks, returns the number of compare matches
    /// that would have raised `TIMER1_COMPA`.
    pub fn clock(&mut self, cycles: u32) -> u32 {
        let factor = self.prescaler().factor();
        if factor == 0 {
            return 0;
        }

        // residue < factor, and factor 1 never leaves a residue
        let total = u64::from(self.residue) + u64::from(cycles);
        let factor = u64::from(factor);
        self.residue = (total % factor) as u32;
        let mut steps = (total / factor) as u32;
        let mut matches = 0;
        let top = u32::from(self.ocr1a);

        while steps > 0 {
            let count = u32::from(self.tcnt1);
            if count == top {
                // The clock after a match clears the counter
                self.tcnt1 = 0;
                steps -= 1;
                if top == 0 && self.ocie1a {
                    matches += 1;
                }
                continue;
            }

            let to_match = if count < top {
                top - count
            } else {
                TIMER1_COUNTER_MAX - count + top
            };
            if steps >= to_match {
                steps -= to_match;
                self.tcnt1 = top as u16;
                if self.ocie1a {
                    matches += 1;
                }
            } else {
                self.tcnt1 = ((count + steps) % TIMER1_COUNTER_MAX) as u16;
                steps = 0;
            }
        }
        matches
    }
}

impl TimerRegisters for SoftTimer {
    fn write_control_a(&mut self, bits: u8) {
        self.tccr1a = bits;
    }

    fn control_b(&self) -> u8 {
        self.tccr1b
    }

    fn write_control_b(&mut self, bits: u8) {
        self.tccr1b = bits;
    }

    fn compare(&self) -> u16 {
        self.ocr1a
    }

    fn write_compare(&mut self, value: u16) {
        self.ocr1a = value;
    }

    fn counter(&self) -> u16 {
        self.tcnt1
    }

    fn write_counter(&mut self, value: u16) {
        self.tcnt1 = value;
        self.residue = 0;
    }

    fn compare_interrupt_enabled(&self) -> bool {
        self.ocie1a
    }

    fn set_compare_interrupt(&mut self, enabled: bool) {
        self.ocie1a = enabled;
    }
}

#[cfg(target_arch = "avr")]
pub use self::avr::Timer1;

#[cfg(target_arch = "avr")]
mod avr {
    use super::TimerRegisters;
    use avr_device::atmega328p::TC1;

    /// OCIE1A in TIMSK1
    const OCIE1A: u8 = 1 << 1;

    /// Timer1 of the ATmega328P
    pub struct Timer1 {
        tc1: TC1,
    }

    impl Timer1 {
        pub fn new(tc1: TC1) -> Self {
            Self { tc1 }
        }
    }

    impl TimerRegisters for Timer1 {
        fn write_control_a(&mut self, bits: u8) {
            self.tc1.tccr1a.write(|w| unsafe { w.bits(bits) });
        }

        fn control_b(&self) -> u8 {
            self.tc1.tccr1b.read().bits()
        }

        fn write_control_b(&mut self, bits: u8) {
            self.tc1.tccr1b.write(|w| unsafe { w.bits(bits) });
        }

        fn compare(&self) -> u16 {
            self.tc1.ocr1a.read().bits()
        }

        fn write_compare(&mut self, value: u16) {
            self.tc1.ocr1a.write(|w| unsafe { w.bits(value) });
        }

        fn counter(&self) -> u16 {
            self.tc1.tcnt1.read().bits()
        }

        fn write_counter(&mut self, value: u16) {
            self.tc1.tcnt1.write(|w| unsafe { w.bits(value) });
        }

        fn compare_interrupt_enabled(&self) -> bool {
            self.tc1.timsk1.read().bits() & OCIE1A != 0
        }

        fn set_compare_interrupt(&mut self, enabled: bool) {
            self.tc1.timsk1.modify(|r, w| unsafe {
                if enabled {
                    w.bits(r.bits() | OCIE1A)
                } else {
                    w.bits(r.bits() & !OCIE1A)
                }
            });
        }
    }
}
