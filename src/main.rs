#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
use panic_halt as _;

#[cfg(target_arch = "avr")]
use embedded_hal::digital::v2::OutputPin;
#[cfg(target_arch = "avr")]
use uno_tick_scheduler::{
    application::Blink,
    config::{ACTIVITY_PERIOD_US, BASE_PERIOD_US, HEARTBEAT_PERIOD_US, REPORT_EVERY_PASSES},
    error,
    hal::{InterruptHook, Pb5, PortB, TickSource, Timer1, Uart0},
    info,
    logger::{Level, Logger, TxQueue},
    rtos::{Scheduler, Task, TickSignal},
    warn,
};

// Shared with TIMER1_COMPA
#[cfg(target_arch = "avr")]
static HOOK: InterruptHook = InterruptHook::new();
#[cfg(target_arch = "avr")]
static TICKS: TickSignal = TickSignal::new();

#[cfg(target_arch = "avr")]
fn on_compare_match() {
    TICKS.signal();
}

#[cfg(target_arch = "avr")]
#[avr_device::interrupt(atmega328p)]
fn TIMER1_COMPA() {
    HOOK.dispatch();
}

#[cfg(target_arch = "avr")]
#[avr_device::entry]
fn main() -> ! {
    let dp = avr_device::atmega328p::Peripherals::take().unwrap();

    let mut uart = Uart0::new(dp.USART0);
    let mut logger = Logger::new(TxQueue::new(), Level::default_max());
    let mut port_b = PortB::new(dp.PORTB);
    let mut fault_led = port_b.into_output::<3>();

    let mut source = TickSource::new(Timer1::new(dp.TC1), &HOOK, &TICKS);
    source.attach_callback(on_compare_match);
    let mut scheduler = Scheduler::init(source, BASE_PERIOD_US);

    let config = scheduler.timer_config();
    if config.is_clamped() {
        warn!(logger, "base period {} us clamped", BASE_PERIOD_US);
    }
    info!(
        logger,
        "tick {} us: prescaler {} compare {}",
        BASE_PERIOD_US,
        config.prescaler.factor(),
        config.compare
    );

    let heartbeat_led: Pb5 = port_b.into_output();
    let mut heartbeat = Blink::new(
        heartbeat_led,
        HEARTBEAT_PERIOD_US,
        BASE_PERIOD_US,
        &TICKS,
    );
    let mut activity = Blink::new(
        port_b.into_output::<4>(),
        ACTIVITY_PERIOD_US,
        BASE_PERIOD_US,
        &TICKS,
    );

    for task in [&mut heartbeat as &mut dyn Task, &mut activity] {
        if let Err(e) = scheduler.add_task(task) {
            error!(logger, "add_task: {}", e);
            let _ = fault_led.set_high();
        }
    }
    info!(logger, "{} of {} tasks registered", scheduler.task_count(), scheduler.capacity());

    // Enable interrupts globally
    unsafe { avr_device::interrupt::enable() };

    loop {
        match scheduler.try_schedule() {
            Ok(()) => {
                let stats = scheduler.stats();
                if stats.passes % REPORT_EVERY_PASSES == 0 {
                    info!(logger, "{}", stats);
                }
            }
            // Between ticks: hand the USART the next queued log byte
            Err(nb::Error::WouldBlock) => {
                let _ = logger.sink().drain_one(&mut uart);
            }
            Err(nb::Error::Other(never)) => void::unreachable(never),
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    eprintln!("uno_tick_scheduler is firmware for avr-unknown-gnu-atmega328; run `cargo test` on the host");
}
