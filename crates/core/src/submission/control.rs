use std::sync::atomic::{AtomicU64, Ordering};

/// Batch id allocation and cooperative cancellation.
///
/// Cancelling records the most recently allocated id; any batch with an id
/// at or below it is canceled. A batch allocated afterwards starts clean.
#[derive(Debug, Default)]
pub struct BatchControl {
    current: AtomicU64,
    last_canceled: AtomicU64,
}

impl BatchControl {
    pub const fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
            last_canceled: AtomicU64::new(0),
        }
    }

    /// Allocate the next batch id. Ids start at 1.
    pub fn allocate(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Cancel the current batch and every earlier one. Returns the id
    /// recorded as canceled.
    pub fn cancel(&self) -> u64 {
        let id = self.current();
        self.last_canceled.fetch_max(id, Ordering::AcqRel);
        id
    }

    pub fn is_canceled(&self, batch_id: u64) -> bool {
        batch_id <= self.last_canceled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_blocks_current_and_earlier() {
        let control = BatchControl::new();
        let first = control.allocate();
        let second = control.allocate();
        assert!(!control.is_canceled(second));

        assert_eq!(control.cancel(), second);
        assert!(control.is_canceled(first));
        assert!(control.is_canceled(second));
    }

    #[test]
    fn test_new_batch_starts_uncanceled() {
        let control = BatchControl::new();
        let old = control.allocate();
        control.cancel();

        let fresh = control.allocate();
        assert!(fresh > old);
        assert!(!control.is_canceled(fresh));
        assert!(control.is_canceled(old));
    }

    #[test]
    fn test_cancel_before_any_batch_is_inert() {
        let control = BatchControl::new();
        assert_eq!(control.cancel(), 0);
        assert!(!control.is_canceled(control.allocate()));
    }
}
