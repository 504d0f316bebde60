//! Leveled serial logger on top of `ufmt`

use ufmt::uWrite;

mod queue;

pub use queue::{TxQueue, TX_QUEUE_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    pub const fn tag(self) -> &'static str {
        match self {
            Level::Error => "[ERR] ",
            Level::Warn => "[WRN] ",
            Level::Info => "[INF] ",
            Level::Debug => "[DBG] ",
        }
    }

    /// Debug builds log everything, release builds stop at `Info`
    pub const fn default_max() -> Self {
        if cfg!(debug_assertions) {
            Level::Debug
        } else {
            Level::Info
        }
    }
}

pub struct Logger<W: uWrite> {
    sink: W,
    max_level: Level,
    dropped: u16,
}

impl<W: uWrite> Logger<W> {
    pub fn new(sink: W, max_level: Level) -> Self {
        Self {
            sink,
            max_level,
            dropped: 0,
        }
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    pub fn set_max_level(&mut self, level: Level) {
        self.max_level = level;
    }

    /// Writes the level tag; false when the record is filtered out or the
    /// sink failed.
    pub fn begin(&mut self, level: Level) -> bool {
        if !self.enabled(level) {
            return false;
        }
        let ok = self.sink.write_str(level.tag()).is_ok();
        self.track(ok)
    }

    /// Counts a failed record write.
    pub fn track(&mut self, ok: bool) -> bool {
        if !ok {
            self.dropped = self.dropped.saturating_add(1);
        }
        ok
    }

    pub fn sink(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Records lost to sink errors
    pub fn dropped(&self) -> u16 {
        self.dropped
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger = &mut $logger;
        if logger.begin($level) {
            let ok = ufmt::uwriteln!(logger.sink(), $($arg)+).is_ok();
            logger.track(ok);
        }
    }};
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::logger::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::logger::Level::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::logger::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::logger::Level::Debug, $($arg)+)
    };
}
