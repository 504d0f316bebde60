//! Tick handoff between the compare-match interrupt and the main loop

use core::cell::Cell;

use critical_section::Mutex;

#[derive(Clone, Copy, Default)]
struct TickState {
    pending: bool,
    now: u32,
    overruns: u32,
}

/// Flag set by the interrupt side, consumed by the scheduler.
///
/// A tick raised while the previous one is still pending collapses into it
/// and is counted as an overrun.
pub struct TickSignal {
    state: Mutex<Cell<TickState>>,
}

impl TickSignal {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(TickState {
                pending: false,
                now: 0,
                overruns: 0,
            })),
        }
    }

    /// Producer side, called from the timer callback.
    pub fn signal(&self) {
        self.update(|state| {
            state.now = state.now.wrapping_add(1);
            if state.pending {
                state.overruns = state.overruns.wrapping_add(1);
            }
            state.pending = true;
        });
    }

    /// Consumer side: true once per signalled tick.
    pub fn take(&self) -> bool {
        self.update(|state| core::mem::replace(&mut state.pending, false))
    }

    pub fn is_pending(&self) -> bool {
        self.read().pending
    }

    /// Drops a pending tick without counting it
    pub fn clear(&self) {
        self.update(|state| state.pending = false);
    }

    /// Ticks signalled since start, wrapping
    pub fn now(&self) -> u32 {
        self.read().now
    }

    /// Ticks lost because the main loop had not consumed the previous one
    pub fn overruns(&self) -> u32 {
        self.read().overruns
    }

    fn read(&self) -> TickState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    fn update<T>(&self, f: impl FnOnce(&mut TickState) -> T) -> T {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }
}

impl Default for TickSignal {
    fn default() -> Self {
        Self::new()
    }
}
