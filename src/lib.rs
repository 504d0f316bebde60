//! Timer1 tick source and cooperative multi-rate scheduler for the ATmega328P
//!
//! [`hal::TickSource`] turns a period in microseconds into Timer1 prescaler and
//! compare settings and fires a callback on compare match.
//! [`rtos::Scheduler`] runs on that single tick and drives any number of
//! [`rtos::Task`]s whose periods are multiples of the base period.
#![cfg_attr(not(test), no_std)]

pub mod application;
pub mod config;
pub mod hal;
pub mod logger;
pub mod rtos;
