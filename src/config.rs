//! Configuration constants for the tick scheduler firmware

/// CPU frequency in Hz, exported by `build.rs`
pub const CPU_FREQ_HZ: u32 = parse_hz(env!("MCU_FREQ_HZ"));

/// Timer clock cycles in one microsecond (prescaler 1)
pub const CYCLES_PER_MICROSECOND: u32 = CPU_FREQ_HZ / 1_000_000;

/// Number of distinct values of the 16-bit Timer1 counter
pub const TIMER1_COUNTER_MAX: u32 = 1 << 16;

/// Usable task slots: a 10-entry table with the last entry kept free
pub const TASK_CAPACITY: usize = 9;

/// Scheduler base period in microseconds
pub const BASE_PERIOD_US: u32 = 1_000;

/// Heartbeat LED toggle period in microseconds
pub const HEARTBEAT_PERIOD_US: u32 = 500_000;

/// Activity LED toggle period in microseconds
pub const ACTIVITY_PERIOD_US: u32 = 100_000;

/// Scheduler passes between two statistics reports
pub const REPORT_EVERY_PASSES: u32 = 5_000;

/// UART baud rate
pub const UART_BAUD: u32 = 9600;

/// USART0 baud rate register value for `UART_BAUD` (normal speed)
pub const UBRR0: u16 = (CPU_FREQ_HZ / (16 * UART_BAUD) - 1) as u16;

const _: () = assert!(CPU_FREQ_HZ % 1_000_000 == 0, "CPU frequency must be a whole number of MHz");
const _: () = assert!(CYCLES_PER_MICROSECOND > 0);
const _: () = assert!(TASK_CAPACITY > 0);
const _: () = assert!(HEARTBEAT_PERIOD_US % BASE_PERIOD_US == 0);
const _: () = assert!(ACTIVITY_PERIOD_US % BASE_PERIOD_US == 0);

const fn parse_hz(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "MCU_FREQ_HZ is not a number");
        value = value * 10 + (digit - b'0') as u32;
        i += 1;
    }
    value
}
