use std::time::Duration;

use tokio::time::Instant;

use super::SubmissionConfig;

/// Exponential retry schedule for per-event submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub unit: Duration,
    pub max_delay: Duration,
    pub poll_slice: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &SubmissionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base: Duration::from_millis(config.base_delay_ms),
            unit: Duration::from_millis(config.backoff_unit_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            poll_slice: Duration::from_millis(config.poll_slice_ms.max(1)),
        }
    }

    /// Delay after the failure of zero-based attempt `attempt`:
    /// `min(base + 2^attempt * unit, max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exponential = self.unit.checked_mul(factor).unwrap_or(Duration::MAX);
        self.base.saturating_add(exponential).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&SubmissionConfig::default())
    }
}

/// Sleep for `duration`, checking `is_canceled` every `slice`.
///
/// Returns `false` if the wait was cut short by cancellation.
pub async fn wait_unless_canceled<F>(duration: Duration, slice: Duration, is_canceled: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + duration;
    loop {
        if is_canceled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep(slice.min(deadline - now)).await;
    }
}
