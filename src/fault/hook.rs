//! Process-wide panic hook.
//!
//! Installed once. While a thread is running an action the hook records the
//! panic location and backtrace into a thread-local slot for the
//! [`FaultHandler`](super::FaultHandler) on that thread, and prints nothing.
//! Outside of actions it defers to the previously installed hook.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic;
use std::sync::Once;

static INSTALL: Once = Once::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

/// Where a panic happened.
#[derive(Debug, Clone, PartialEq)]
pub struct PanicRecord {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub trace: String,
}

/// Install the hook. Calling this more than once has no further effect.
pub fn install() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let location = info.location();
                let record = PanicRecord {
                    file: location.map(|l| l.file().to_string()),
                    line: location.map(|l| l.line()),
                    trace: Backtrace::force_capture().to_string(),
                };
                LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(record));
            } else {
                previous(info);
            }
        }));
    });
}

/// Take the record left by the last panic on this thread.
pub fn take_last_panic() -> Option<PanicRecord> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// While alive, panics on this thread are recorded instead of printed.
pub struct CaptureGuard {
    was_capturing: bool,
}

impl CaptureGuard {
    pub fn new() -> Self {
        LAST_PANIC.with(|slot| *slot.borrow_mut() = None);
        let was_capturing = CAPTURING.with(|c| c.replace(true));
        Self { was_capturing }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURING.with(|c| c.set(self.was_capturing));
    }
}
