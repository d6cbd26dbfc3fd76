//! Single-flight guards for long-running operations.

use std::sync::atomic::{AtomicBool, Ordering};

/// Admits at most one holder at a time.
///
/// Entry is a compare-and-swap, so two racing callers can never both
/// proceed. The flag is cleared when the returned guard drops, including
/// on early return and error paths.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Enter the operation, or `None` if it is already in progress.
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { busy: &self.busy })
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of a single-flight operation.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
