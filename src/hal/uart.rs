//! USART0 transmitter
//!
//! Non-blocking `serial::Write`: a byte is accepted only while the data
//! register is empty, otherwise the caller gets `WouldBlock`.

use avr_device::atmega328p::USART0;
use core::convert::Infallible;
use embedded_hal::serial;

use crate::config::UBRR0;

/// TXEN0 in UCSR0B
const TXEN0: u8 = 1 << 3;
/// UDRE0 in UCSR0A
const UDRE0: u8 = 1 << 5;
/// 8 data bits, no parity, 1 stop bit
const UCSZ_8N1: u8 = 0b0000_0110;

pub struct Uart0 {
    usart: USART0,
}

impl Uart0 {
    pub fn new(usart: USART0) -> Self {
        usart.ubrr0.write(|w| unsafe { w.bits(UBRR0) });
        usart.ucsr0c.write(|w| unsafe { w.bits(UCSZ_8N1) });
        usart.ucsr0b.write(|w| unsafe { w.bits(TXEN0) });
        Self { usart }
    }

    fn data_register_empty(&self) -> bool {
        self.usart.ucsr0a.read().bits() & UDRE0 != 0
    }
}

impl serial::Write<u8> for Uart0 {
    type Error = Infallible;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        if !self.data_register_empty() {
            return Err(nb::Error::WouldBlock);
        }
        self.usart.udr0.write(|w| unsafe { w.bits(byte) });
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.data_register_empty() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}
