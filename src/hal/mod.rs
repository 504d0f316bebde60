pub mod timer;
#[cfg(target_arch = "avr")]
pub mod gpio;
#[cfg(target_arch = "avr")]
pub mod uart;

// Re-export commonly used types
pub use timer::{
    Callback, InterruptHook, Microseconds, Prescaler, SoftTimer, TickSource, TimerConfig,
    TimerRegisters,
};
#[cfg(target_arch = "avr")]
pub use timer::Timer1;
#[cfg(target_arch = "avr")]
pub use gpio::{Pb5, Pin, PortB};
#[cfg(target_arch = "avr")]
pub use uart::Uart0;
