use std::env;

const DEFAULT_CPU_FREQ_HZ: &str = "16000000";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=AVR_CPU_FREQUENCY_HZ");

    // Pass CPU frequency for timing calculations
    let freq = env::var("AVR_CPU_FREQUENCY_HZ").unwrap_or_else(|_| DEFAULT_CPU_FREQ_HZ.into());
    if freq.is_empty() || !freq.bytes().all(|b| b.is_ascii_digit()) {
        panic!("AVR_CPU_FREQUENCY_HZ must be a decimal number of Hz, got {:?}", freq);
    }
    println!("cargo:rustc-env=MCU_FREQ_HZ={}", freq);

    // Host builds only run the unit and integration tests
    let target = env::var("TARGET").unwrap_or_default();
    if target.contains("avr") {
        println!("cargo:warning=Building for ATmega328P at {} Hz", freq);
    }
}
