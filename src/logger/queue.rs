//! Transmit queue between log records and the serial port
//!
//! Records are formatted into the queue at once and leave it one byte per
//! call to [`TxQueue::drain_one`], so a report never holds the main loop for
//! the time the USART needs to shift it out.

use embedded_hal::serial;

/// Capacity in bytes, power of 2 for index masking
pub const TX_QUEUE_SIZE: usize = 128;
const TX_QUEUE_MASK: usize = TX_QUEUE_SIZE - 1;

/// Byte ring buffer; one slot stays free to tell full from empty.
pub struct TxQueue {
    data: [u8; TX_QUEUE_SIZE],
    write_idx: usize,
    read_idx: usize,
}

impl TxQueue {
    pub const fn new() -> Self {
        Self {
            data: [0; TX_QUEUE_SIZE],
            write_idx: 0,
            read_idx: 0,
        }
    }

    /// False when the queue is full and `byte` was not stored.
    pub fn push(&mut self, byte: u8) -> bool {
        let next_write = (self.write_idx + 1) & TX_QUEUE_MASK;
        if next_write == self.read_idx {
            return false;
        }
        self.data[self.write_idx] = byte;
        self.write_idx = next_write;
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.read_idx = (self.read_idx + 1) & TX_QUEUE_MASK;
        Some(byte)
    }

    pub fn peek(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.data[self.read_idx])
        }
    }

    pub fn len(&self) -> usize {
        self.write_idx.wrapping_sub(self.read_idx) & TX_QUEUE_MASK
    }

    pub fn is_empty(&self) -> bool {
        self.read_idx == self.write_idx
    }

    /// Hands the oldest byte to `port` if it can take it right now.
    ///
    /// Returns `WouldBlock` while the port is busy; the byte stays queued.
    pub fn drain_one<S>(&mut self, port: &mut S) -> nb::Result<(), S::Error>
    where
        S: serial::Write<u8>,
    {
        if let Some(byte) = self.peek() {
            port.write(byte)?;
            self.pop();
        }
        Ok(())
    }
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ufmt::uWrite for TxQueue {
    /// Queue full, the rest of the record is lost
    type Error = ();

    fn write_str(&mut self, s: &str) -> Result<(), ()> {
        for byte in s.bytes() {
            if byte == b'\n' && !self.push(b'\r') {
                return Err(());
            }
            if !self.push(byte) {
                return Err(());
            }
        }
        Ok(())
    }
}
