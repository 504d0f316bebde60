//! PORTB output pins of the ATmega328P

use avr_device::atmega328p::PORTB;
use core::convert::Infallible;
use embedded_hal::digital::v2::OutputPin;

/// Owner of PORTB, hands out output pins
pub struct PortB {
    _port: PORTB,
}

impl PortB {
    pub fn new(port: PORTB) -> Self {
        Self { _port: port }
    }

    /// Sets DDRB bit `N` and drives the pin low.
    pub fn into_output<const N: u8>(&mut self) -> Pin<N> {
        let mut pin = Pin { _private: () };
        unsafe {
            (*PORTB::ptr()).ddrb.modify(|r, w| w.bits(r.bits() | (1 << N)));
        }
        let _ = pin.set_low();
        pin
    }
}

pub struct Pin<const N: u8> {
    _private: (),
}

/// Arduino Uno on-board LED (digital 13)
pub type Pb5 = Pin<5>;

impl<const N: u8> OutputPin for Pin<N> {
    type Error = Infallible;

    #[inline]
    fn set_low(&mut self) -> Result<(), Self::Error> {
        unsafe {
            (*PORTB::ptr()).portb.modify(|r, w| w.bits(r.bits() & !(1 << N)));
        }
        Ok(())
    }

    #[inline]
    fn set_high(&mut self) -> Result<(), Self::Error> {
        unsafe {
            (*PORTB::ptr()).portb.modify(|r, w| w.bits(r.bits() | (1 << N)));
        }
        Ok(())
    }
}
